use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use super::CompressionBackend;
use crate::config::SnzipFormat;

/// Runs the external snzip binary, stdout captured into the artifact
#[derive(Debug, Clone)]
pub struct SnzipBackend {
    binary: PathBuf,
    format: SnzipFormat,
}

impl SnzipBackend {
    pub fn new(binary: &Path, format: SnzipFormat) -> Self {
        Self {
            binary: binary.to_path_buf(),
            format,
        }
    }

    /// `<snzip> [-t <format>] -c <input>`
    pub fn command(&self, input: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(self.format.mode_args()).arg("-c").arg(input);
        cmd
    }
}

impl CompressionBackend for SnzipBackend {
    fn extension(&self) -> &'static str {
        "snappy"
    }

    fn compress(&self, input: &Path, output: &Path) -> io::Result<()> {
        let stdout = File::create(output)?;
        let mut cmd = self.command(input);
        debug!(command = ?cmd, "Running snzip");

        let result = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                io::Error::new(
                    e.kind(),
                    format!("failed to run {}: {}", self.binary.display(), e),
                )
            })?;

        if !result.status.success() {
            return Err(io::Error::other(format!(
                "{} exited with {}: {}",
                self.binary.display(),
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    /// Stand-in for snzip: records its arguments and echoes the input file
    fn fake_snzip(dir: &Path, exit_code: i32) -> PathBuf {
        let script = dir.join("snzip");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\necho \"$@\" > \"{}\"\nfor last; do :; done\ncat \"$last\"\necho oops >&2\nexit {}\n",
                dir.join("args.txt").display(),
                exit_code
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[test]
    fn test_mode_flags_passed_as_arguments() {
        let dir = tempdir().unwrap();
        let binary = fake_snzip(dir.path(), 0);
        let input = dir.path().join("access.log.1");
        let output = dir.path().join("access.log.1.snappy");
        std::fs::write(&input, b"payload").unwrap();

        let cases = [
            (SnzipFormat::HadoopSnappy, "-t hadoop-snappy -c "),
            (SnzipFormat::SnappyJava, "-t snappy-java -c "),
            (SnzipFormat::SnappyInJava, "-t snappy-in-java -c "),
            (SnzipFormat::Raw, "-t raw -c "),
            (SnzipFormat::FramingFormat, "-c "),
        ];
        for (format, expected) in cases {
            SnzipBackend::new(&binary, format)
                .compress(&input, &output)
                .unwrap();
            let args = std::fs::read_to_string(dir.path().join("args.txt")).unwrap();
            assert_eq!(args.trim_end(), format!("{}{}", expected, input.display()));
            assert_eq!(std::fs::read(&output).unwrap(), b"payload");
        }
    }

    #[test]
    fn test_nonzero_exit_is_error() {
        let dir = tempdir().unwrap();
        let binary = fake_snzip(dir.path(), 3);
        let input = dir.path().join("in");
        std::fs::write(&input, b"x").unwrap();

        let err = SnzipBackend::new(&binary, SnzipFormat::Raw)
            .compress(&input, &dir.path().join("out"))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("exit status: 3"), "{}", msg);
        assert!(msg.contains("oops"), "{}", msg);
    }

    #[test]
    fn test_missing_binary_is_error() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in");
        std::fs::write(&input, b"x").unwrap();

        let backend = SnzipBackend::new(&dir.path().join("no-snzip"), SnzipFormat::Raw);
        assert!(backend.compress(&input, &dir.path().join("out")).is_err());
    }
}
