/*!
 * Compression stage: gzip detection, normalisation and recompression
 */

mod gzip;
mod snappy;
mod snzip;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, warn};

use crate::config::{CompressionAlgorithm, ShipConfig};
use crate::error::{Result, ShipError};
use crate::stats::{format_bytes, format_duration};

pub use gzip::{gunzip, is_gzip, GzipBackend};
pub use snappy::SnappyBackend;
pub use snzip::SnzipBackend;

/// A transform from one file to one compressed file
pub trait CompressionBackend: Send + Sync {
    /// Extension appended to the artifact name, without the dot
    fn extension(&self) -> &'static str;

    /// Gzip input is shipped unchanged instead of being decompressed first
    fn keeps_gzip(&self) -> bool {
        false
    }

    /// Compress `input` into a new file at `output`
    fn compress(&self, input: &Path, output: &Path) -> io::Result<()>;
}

/// The file handed to the uploader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Local file to upload; unique within the scratch directory
    pub path: PathBuf,
    /// Name the object is stored under, `<input name>.<extension>`
    pub name: String,
    pub size_bytes: u64,
    /// Decompressed copy of gzip input, removed together with the artifact
    pub intermediate: Option<PathBuf>,
}

/// Process-wide scratch directory, created on first use
#[derive(Debug, Clone)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create the directory if needed. Safe to race from several workers.
    pub fn ensure(&self) -> io::Result<&Path> {
        fs::create_dir_all(&self.path)?;
        Ok(&self.path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Produces exactly one artifact per source file
pub struct Compressor {
    label: String,
    backend: Box<dyn CompressionBackend>,
    scratch: ScratchDir,
}

impl Compressor {
    /// Build the backend for `algorithm`. snzip algorithms need `snzip_path`.
    pub fn new(
        algorithm: CompressionAlgorithm,
        snzip_path: Option<&Path>,
        scratch: ScratchDir,
    ) -> Result<Self> {
        let backend: Box<dyn CompressionBackend> = match algorithm.snzip_format() {
            Some(format) => {
                let binary = snzip_path.ok_or_else(|| {
                    ShipError::Config(format!(
                        "Compression {} requires the snzip binary; set snzip_path",
                        algorithm
                    ))
                })?;
                Box::new(SnzipBackend::new(binary, format))
            }
            None if algorithm == CompressionAlgorithm::Gzip => Box::new(GzipBackend),
            None => Box::new(SnappyBackend),
        };

        Ok(Self::with_backend(algorithm.as_str(), backend, scratch))
    }

    pub fn from_config(config: &ShipConfig) -> Result<Self> {
        Self::new(
            config.compression,
            config.snzip_path.as_deref(),
            ScratchDir::new(config.scratch_dir()),
        )
    }

    /// Use a custom backend; `label` appears in logs and errors
    pub fn with_backend(
        label: &str,
        backend: Box<dyn CompressionBackend>,
        scratch: ScratchDir,
    ) -> Self {
        Self {
            label: label.to_string(),
            backend,
            scratch,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Compress `source` into the scratch directory.
    ///
    /// Gzip input is either passed through (when the backend keeps gzip) or
    /// decompressed into the scratch directory and compressed from there.
    /// Scratch files carry a random infix so sources sharing a base name in
    /// different directories never touch each other's files.
    pub fn compress(&self, source: &Path) -> Result<Artifact> {
        let start = Instant::now();
        let fail = |detail: io::Error| ShipError::compression(source, &self.label, detail);
        let no_name = || {
            fail(io::Error::new(
                io::ErrorKind::InvalidInput,
                "source has no file name",
            ))
        };

        let gzipped = is_gzip(source).map_err(fail)?;

        if gzipped && self.backend.keeps_gzip() {
            let name = source.file_name().ok_or_else(no_name)?;
            let size_bytes = fs::metadata(source).map_err(fail)?.len();
            info!(path = %source.display(), "Already gzip, not compressed");
            return Ok(Artifact {
                path: source.to_path_buf(),
                name: name.to_string_lossy().into_owned(),
                size_bytes,
                intermediate: None,
            });
        }

        let scratch = self.scratch.ensure().map_err(fail)?;

        let (input, input_name, intermediate) = if gzipped {
            let stem = source
                .file_stem()
                .ok_or_else(no_name)?
                .to_string_lossy()
                .into_owned();
            let decompressed = reserve(scratch, &stem, "").map_err(fail)?;
            if let Err(e) = gunzip(source, &decompressed) {
                remove_scratch(&decompressed);
                return Err(fail(e));
            }
            (decompressed.clone(), stem, Some(decompressed))
        } else {
            let name = source
                .file_name()
                .ok_or_else(no_name)?
                .to_string_lossy()
                .into_owned();
            (source.to_path_buf(), name, None)
        };

        let name = format!("{}.{}", input_name, self.backend.extension());
        let suffix = format!(".{}", self.backend.extension());
        let output = match reserve(scratch, &input_name, &suffix) {
            Ok(path) => path,
            Err(e) => {
                if let Some(path) = &intermediate {
                    remove_scratch(path);
                }
                return Err(fail(e));
            }
        };

        info!(path = %input.display(), algorithm = %self.label, "Compressing");
        let size_bytes = self
            .backend
            .compress(&input, &output)
            .and_then(|()| fs::metadata(&output).map(|m| m.len()));
        let size_bytes = match size_bytes {
            Ok(size) => size,
            Err(e) => {
                remove_scratch(&output);
                if let Some(path) = &intermediate {
                    remove_scratch(path);
                }
                return Err(fail(e));
            }
        };

        info!(
            artifact = %output.display(),
            size = %format_bytes(size_bytes),
            "Compressed in {}",
            format_duration(start.elapsed())
        );

        Ok(Artifact {
            path: output,
            name,
            size_bytes,
            intermediate,
        })
    }
}

/// Create an empty, uniquely named file `<stem>.XXXXXX<suffix>` in `dir`
fn reserve(dir: &Path, stem: &str, suffix: &str) -> io::Result<PathBuf> {
    let file = tempfile::Builder::new()
        .prefix(&format!("{}.", stem))
        .suffix(suffix)
        .rand_bytes(6)
        .tempfile_in(dir)?;
    let (_, path) = file.keep()?;
    Ok(path)
}

fn remove_scratch(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(path = %path.display(), "Failed to remove scratch file: {}", e);
        }
    }
}
