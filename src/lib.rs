/*!
 * logship - ship rotated log files to object storage
 *
 * Watches a directory tree for files closed after writing, keeps the ones
 * matching a path pattern, recompresses them (gzip, snappy or an external
 * snzip format), uploads them under a time-partitioned key and removes the
 * local artifact once the upload succeeded.
 */

pub mod compression;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod stats;
pub mod upload;

// Re-export commonly used types
pub use compression::{Artifact, CompressionBackend, Compressor, ScratchDir};
pub use config::{CompressionAlgorithm, ErrorMode, LogLevel, ShipConfig, SnzipFormat};
pub use crate::core::filter::{MatchedPath, PathMatcher};
pub use crate::core::pipeline::{shutdown_channel, Pipeline, ShutdownHandle, ShutdownSignal};
pub use crate::core::watcher::{LogWatcher, WatchEvent, WatchKind};
pub use error::{Result, ShipError};
pub use upload::{AwsCliUploader, UploadOutcome, UploadTarget, Uploader};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
