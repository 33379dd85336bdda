use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::{GzDecoder, MultiGzDecoder};
use flate2::write::GzEncoder;
use flate2::Compression;

use super::CompressionBackend;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// True if the file opens as a gzip stream, whatever its extension.
///
/// The header must parse and the first deflate block must decode. I/O errors
/// opening the file are returned, decode errors mean "not gzip".
pub fn is_gzip(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;

    let mut magic = [0u8; 2];
    match file.read_exact(&mut magic) {
        Ok(()) if magic == GZIP_MAGIC => {}
        Ok(()) => return Ok(false),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(false),
        Err(e) => return Err(e),
    }

    let mut decoder = GzDecoder::new(BufReader::new(File::open(path)?));
    let mut first = [0u8; 1];
    Ok(decoder.read(&mut first).is_ok())
}

/// Stream the whole decompressed payload of `source` into `dest`
pub fn gunzip(source: &Path, dest: &Path) -> io::Result<u64> {
    let mut decoder = MultiGzDecoder::new(BufReader::new(File::open(source)?));
    let mut out = BufWriter::new(File::create(dest)?);
    let written = io::copy(&mut decoder, &mut out)?;
    out.flush()?;
    Ok(written)
}

/// gzip at the default level; gzip input is shipped unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipBackend;

impl CompressionBackend for GzipBackend {
    fn extension(&self) -> &'static str {
        "gz"
    }

    fn keeps_gzip(&self) -> bool {
        true
    }

    fn compress(&self, input: &Path, output: &Path) -> io::Result<()> {
        let mut reader = BufReader::new(File::open(input)?);
        let mut encoder = GzEncoder::new(
            BufWriter::new(File::create(output)?),
            Compression::default(),
        );
        io::copy(&mut reader, &mut encoder)?;
        encoder.finish()?.flush()
    }
}
