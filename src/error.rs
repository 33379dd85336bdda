/*!
 * Error types for logship
 */

use std::fmt;
use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, ShipError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_TASK_FAILED: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Debug)]
pub enum ShipError {
    /// Configuration error (missing or invalid option)
    Config(String),

    /// The watch on the log directory could not be established
    Watch { root: PathBuf, detail: String },

    /// I/O error outside of compression or upload
    Io(io::Error),

    /// Compression or gzip normalisation failed
    Compression {
        path: PathBuf,
        algorithm: String,
        detail: String,
    },

    /// Transfer invocation failed or exited non-zero
    Upload {
        path: PathBuf,
        destination: String,
        detail: String,
    },

    /// The pipeline was already shut down
    Shutdown,
}

impl ShipError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ShipError::Config(_) | ShipError::Watch { .. } => EXIT_FATAL,
            _ => EXIT_TASK_FAILED,
        }
    }

    /// Errors raised while processing a single file
    pub fn is_task_failure(&self) -> bool {
        matches!(
            self,
            ShipError::Compression { .. } | ShipError::Upload { .. }
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            ShipError::Config(_) => ErrorCategory::Configuration,
            ShipError::Watch { .. } => ErrorCategory::Filesystem,
            ShipError::Io(_) => ErrorCategory::IoError,
            ShipError::Compression { .. } => ErrorCategory::Codec,
            ShipError::Upload { .. } => ErrorCategory::Transfer,
            ShipError::Shutdown => ErrorCategory::Concurrency,
        }
    }

    pub(crate) fn compression(
        path: impl Into<PathBuf>,
        algorithm: impl fmt::Display,
        detail: impl fmt::Display,
    ) -> Self {
        ShipError::Compression {
            path: path.into(),
            algorithm: algorithm.to_string(),
            detail: detail.to_string(),
        }
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Configuration errors
    Configuration,
    /// Watch setup and filesystem errors
    Filesystem,
    /// I/O operation errors
    IoError,
    /// Compression/decompression errors
    Codec,
    /// Upload errors
    Transfer,
    /// Queue and worker errors
    Concurrency,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Filesystem => write!(f, "filesystem"),
            ErrorCategory::IoError => write!(f, "io"),
            ErrorCategory::Codec => write!(f, "codec"),
            ErrorCategory::Transfer => write!(f, "transfer"),
            ErrorCategory::Concurrency => write!(f, "concurrency"),
        }
    }
}

impl fmt::Display for ShipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShipError::Config(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            ShipError::Watch { root, detail } => {
                write!(f, "Failed to watch {}: {}", root.display(), detail)
            }
            ShipError::Io(err) => {
                write!(f, "I/O error: {}", err)
            }
            ShipError::Compression {
                path,
                algorithm,
                detail,
            } => {
                write!(
                    f,
                    "Compression of {} using {} failed: {}",
                    path.display(),
                    algorithm,
                    detail
                )
            }
            ShipError::Upload {
                path,
                destination,
                detail,
            } => {
                write!(
                    f,
                    "Upload of {} to {} failed: {}",
                    path.display(),
                    destination,
                    detail
                )
            }
            ShipError::Shutdown => {
                write!(f, "Pipeline is shut down")
            }
        }
    }
}

impl std::error::Error for ShipError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ShipError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ShipError {
    fn from(err: io::Error) -> Self {
        ShipError::Io(err)
    }
}

impl From<crate::core::filter::FilterError> for ShipError {
    fn from(err: crate::core::filter::FilterError) -> Self {
        ShipError::Config(err.to_string())
    }
}
