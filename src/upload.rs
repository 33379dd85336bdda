/*!
 * Transfer of artifacts to object storage
 */

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::{Credentials, ShipConfig, ACCESS_KEY_ENV, SECRET_KEY_ENV};
use crate::error::Result;

/// Where an artifact goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub bucket: String,
    /// `<app_dir>/<date partition>/<prefix>_<name>`
    pub key: String,
}

impl UploadTarget {
    pub fn new(bucket: &str, key: String) -> Self {
        Self {
            bucket: bucket.to_string(),
            key,
        }
    }

    /// `s3://<bucket>/<key>`
    pub fn locator(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}

impl fmt::Display for UploadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.locator())
    }
}

/// Result of one transfer attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub succeeded: bool,
    pub duration: Duration,
    pub size_bytes: u64,
    pub error_detail: Option<String>,
}

impl UploadOutcome {
    pub fn success(duration: Duration, size_bytes: u64) -> Self {
        Self {
            succeeded: true,
            duration,
            size_bytes,
            error_detail: None,
        }
    }

    pub fn failure(duration: Duration, size_bytes: u64, detail: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            duration,
            size_bytes,
            error_detail: Some(detail.into()),
        }
    }
}

/// Transfers one artifact. No retries; a failure is reported as-is.
pub trait Uploader: Send + Sync {
    fn upload(&self, artifact: &Path, target: &UploadTarget) -> UploadOutcome;
}

/// Uploads through the AWS command line client:
/// `aws s3 cp --storage-class <class> <artifact> s3://<bucket>/<key>`.
///
/// Success is the exit status of the child process.
#[derive(Debug, Clone)]
pub struct AwsCliUploader {
    program: PathBuf,
    storage_class: String,
    credentials: Credentials,
}

impl AwsCliUploader {
    pub fn new(program: &Path, storage_class: &str, credentials: Credentials) -> Self {
        Self {
            program: program.to_path_buf(),
            storage_class: storage_class.to_string(),
            credentials,
        }
    }

    pub fn from_config(config: &ShipConfig) -> Result<Self> {
        Ok(Self::new(
            &config.aws_cli,
            &config.storage_class,
            config.credentials()?,
        ))
    }

    /// Argument vector for one upload, credentials in the environment
    pub fn command(&self, artifact: &Path, target: &UploadTarget) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["s3", "cp", "--storage-class"])
            .arg(&self.storage_class)
            .arg(artifact)
            .arg(target.locator())
            .env(ACCESS_KEY_ENV, &self.credentials.access_key)
            .env(SECRET_KEY_ENV, &self.credentials.secret_key);
        cmd
    }
}

impl Uploader for AwsCliUploader {
    fn upload(&self, artifact: &Path, target: &UploadTarget) -> UploadOutcome {
        let size_bytes = std::fs::metadata(artifact).map(|m| m.len()).unwrap_or(0);
        let start = Instant::now();

        let output = self
            .command(artifact, target)
            .stdin(Stdio::null())
            .output();

        let duration = start.elapsed();
        match output {
            Ok(output) => {
                debug!(
                    stdout = %String::from_utf8_lossy(&output.stdout).trim(),
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "Transfer finished with {}",
                    output.status
                );
                if output.status.success() {
                    UploadOutcome::success(duration, size_bytes)
                } else {
                    UploadOutcome::failure(
                        duration,
                        size_bytes,
                        format!(
                            "{} exited with {}: {}",
                            self.program.display(),
                            output.status,
                            String::from_utf8_lossy(&output.stderr).trim()
                        ),
                    )
                }
            }
            Err(e) => UploadOutcome::failure(
                duration,
                size_bytes,
                format!("failed to run {}: {}", self.program.display(), e),
            ),
        }
    }
}
