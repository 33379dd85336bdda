/*!
 * Configuration types for logship
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};

use crate::core::filter::PathMatcher;
use crate::error::{Result, ShipError};

/// Environment variable consulted when no access key is configured
pub const ACCESS_KEY_ENV: &str = "AWS_ACCESS_KEY_ID";
/// Environment variable consulted when no secret key is configured
pub const SECRET_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";

/// Main configuration for the shipping pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipConfig {
    /// Root directory watched recursively
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Regular expression matched against the start of each event path
    #[serde(default = "default_path_pattern")]
    pub path_pattern: String,

    /// Destination bucket
    #[serde(default)]
    pub bucket: String,

    /// Top-level key segment inside the bucket
    #[serde(default)]
    pub app_dir: String,

    /// Literal prefix for uploaded file names (random token when unset)
    #[serde(default)]
    pub file_prefix: Option<String>,

    /// Access key, falls back to `AWS_ACCESS_KEY_ID`
    #[serde(default)]
    pub access_key: Option<String>,

    /// Secret key, falls back to `AWS_SECRET_ACCESS_KEY`
    #[serde(default)]
    pub secret_key: Option<String>,

    /// Storage class passed through to the transfer
    #[serde(default = "default_storage_class")]
    pub storage_class: String,

    /// Location of the snzip binary
    #[serde(default)]
    pub snzip_path: Option<PathBuf>,

    /// Base directory for the compression scratch subdirectory
    #[serde(default = "default_tmp_dir")]
    pub tmp_dir: PathBuf,

    /// Compression applied before upload
    #[serde(default)]
    pub compression: CompressionAlgorithm,

    /// strftime pattern for the date partition of the key
    #[serde(default = "default_datetime_format")]
    pub datetime_format: String,

    /// Transfer executable
    #[serde(default = "default_aws_cli")]
    pub aws_cli: PathBuf,

    /// Number of worker threads processing the queue
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Dispatch queue capacity (0 = unbounded)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Also ship files on create events, not only on close-after-write.
    /// A file created and then written is shipped twice, once per event.
    #[serde(default)]
    pub trigger_on_create: bool,

    /// What a single file failure does to the pipeline
    #[serde(default)]
    pub error_mode: ErrorMode,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stdout)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,
}

impl Default for ShipConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            path_pattern: default_path_pattern(),
            bucket: String::new(),
            app_dir: String::new(),
            file_prefix: None,
            access_key: None,
            secret_key: None,
            storage_class: default_storage_class(),
            snzip_path: None,
            tmp_dir: default_tmp_dir(),
            compression: CompressionAlgorithm::default(),
            datetime_format: default_datetime_format(),
            aws_cli: default_aws_cli(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            trigger_on_create: false,
            error_mode: ErrorMode::Abort,
            log_level: LogLevel::Info,
            log_file: None,
            verbose: false,
        }
    }
}

/// Compression applied to each matched file before upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CompressionAlgorithm {
    /// Ship gzip input as-is, gzip everything else
    Gzip,
    /// In-process snappy framing format
    #[default]
    #[serde(alias = "python-snappy")]
    Snappy,
    /// snzip `-t hadoop-snappy`
    SnzipHadoopSnappy,
    /// snzip default framing format
    SnzipFramingFormat,
    /// snzip `-t snappy-java`
    SnzipSnappyJava,
    /// snzip `-t snappy-in-java`
    SnzipSnappyInJava,
    /// snzip `-t raw`
    SnzipRaw,
}

impl CompressionAlgorithm {
    /// The snzip sub-format, if this algorithm runs the external binary
    pub fn snzip_format(&self) -> Option<SnzipFormat> {
        match self {
            CompressionAlgorithm::Gzip | CompressionAlgorithm::Snappy => None,
            CompressionAlgorithm::SnzipHadoopSnappy => Some(SnzipFormat::HadoopSnappy),
            CompressionAlgorithm::SnzipFramingFormat => Some(SnzipFormat::FramingFormat),
            CompressionAlgorithm::SnzipSnappyJava => Some(SnzipFormat::SnappyJava),
            CompressionAlgorithm::SnzipSnappyInJava => Some(SnzipFormat::SnappyInJava),
            CompressionAlgorithm::SnzipRaw => Some(SnzipFormat::Raw),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionAlgorithm::Gzip => "gzip",
            CompressionAlgorithm::Snappy => "snappy",
            CompressionAlgorithm::SnzipHadoopSnappy => "snzip-hadoop-snappy",
            CompressionAlgorithm::SnzipFramingFormat => "snzip-framing-format",
            CompressionAlgorithm::SnzipSnappyJava => "snzip-snappy-java",
            CompressionAlgorithm::SnzipSnappyInJava => "snzip-snappy-in-java",
            CompressionAlgorithm::SnzipRaw => "snzip-raw",
        }
    }
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output formats of the snzip binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnzipFormat {
    HadoopSnappy,
    FramingFormat,
    SnappyJava,
    SnappyInJava,
    Raw,
}

impl SnzipFormat {
    /// Arguments selecting this format; framing format is snzip's default
    pub fn mode_args(&self) -> &'static [&'static str] {
        match self {
            SnzipFormat::HadoopSnappy => &["-t", "hadoop-snappy"],
            SnzipFormat::FramingFormat => &[],
            SnzipFormat::SnappyJava => &["-t", "snappy-java"],
            SnzipFormat::SnappyInJava => &["-t", "snappy-in-java"],
            SnzipFormat::Raw => &["-t", "raw"],
        }
    }
}

/// Behaviour when compressing or uploading a single file fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMode {
    /// Stop the pipeline and exit non-zero
    #[default]
    Abort,
    /// Log the failure, keep the artifact and continue with the next file
    Skip,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,
    /// Warnings and errors
    Warn,
    /// Info, warnings, and errors
    #[default]
    Info,
    /// Debug and above
    Debug,
    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Resolved object storage credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

// Default value functions for serde
fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/nginx")
}

fn default_path_pattern() -> String {
    ".*(.1.gz)$".to_string()
}

fn default_storage_class() -> String {
    "REDUCED_REDUNDANCY".to_string()
}

fn default_tmp_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

fn default_datetime_format() -> String {
    "%Y/%m/%d/%H/%M".to_string()
}

fn default_aws_cli() -> PathBuf {
    PathBuf::from("aws")
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    1024
}

impl ShipConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ShipError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&contents)
            .map_err(|e| ShipError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Check every option that can be checked before the watch starts
    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(ShipError::Config("Bucket name is required".to_string()));
        }
        if self.app_dir.trim().is_empty() {
            return Err(ShipError::Config("App directory is required".to_string()));
        }
        if self.workers == 0 {
            return Err(ShipError::Config(
                "Worker count must be greater than 0".to_string(),
            ));
        }

        PathMatcher::new(&self.path_pattern)?;
        validate_datetime_format(&self.datetime_format)?;

        if self.compression.snzip_format().is_some() && self.snzip_path.is_none() {
            return Err(ShipError::Config(format!(
                "Compression {} requires the snzip binary; set snzip_path",
                self.compression
            )));
        }

        self.credentials()?;
        Ok(())
    }

    /// Explicit credentials win, otherwise the standard AWS environment variables
    pub fn credentials(&self) -> Result<Credentials> {
        self.credentials_with(|name| std::env::var(name).ok())
    }

    pub(crate) fn credentials_with<F>(&self, lookup: F) -> Result<Credentials>
    where
        F: Fn(&str) -> Option<String>,
    {
        let access_key = self
            .access_key
            .clone()
            .or_else(|| lookup(ACCESS_KEY_ENV))
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ShipError::Config(format!(
                    "Access key not set and {} is not in the environment",
                    ACCESS_KEY_ENV
                ))
            })?;
        let secret_key = self
            .secret_key
            .clone()
            .or_else(|| lookup(SECRET_KEY_ENV))
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ShipError::Config(format!(
                    "Secret key not set and {} is not in the environment",
                    SECRET_KEY_ENV
                ))
            })?;

        Ok(Credentials {
            access_key,
            secret_key,
        })
    }

    /// Process-wide scratch directory for compression output
    pub fn scratch_dir(&self) -> PathBuf {
        self.tmp_dir.join("logship_temp")
    }
}

/// Reject strftime patterns chrono cannot render
fn validate_datetime_format(format: &str) -> Result<()> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(ShipError::Config(format!(
            "Invalid datetime format '{}'",
            format
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ShipConfig {
        ShipConfig {
            bucket: "logs".to_string(),
            app_dir: "nginx".to_string(),
            access_key: Some("AKIA".to_string()),
            secret_key: Some("secret".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = ShipConfig::default();
        assert_eq!(config.log_dir, PathBuf::from("/var/log/nginx"));
        assert_eq!(config.compression, CompressionAlgorithm::Snappy);
        assert_eq!(config.storage_class, "REDUCED_REDUNDANCY");
        assert_eq!(config.datetime_format, "%Y/%m/%d/%H/%M");
        assert_eq!(config.error_mode, ErrorMode::Abort);
        assert!(!config.trigger_on_create);
    }

    #[test]
    fn test_validate_ok() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_requires_bucket_and_app_dir() {
        let mut config = valid_config();
        config.bucket.clear();
        assert!(matches!(config.validate(), Err(ShipError::Config(_))));

        let mut config = valid_config();
        config.app_dir = "  ".to_string();
        assert!(matches!(config.validate(), Err(ShipError::Config(_))));
    }

    #[test]
    fn test_validate_snzip_requires_path() {
        let mut config = valid_config();
        config.compression = CompressionAlgorithm::SnzipRaw;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("snzip"));

        config.snzip_path = Some(PathBuf::from("/usr/local/bin/snzip"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_pattern_and_format() {
        let mut config = valid_config();
        config.path_pattern = "(unclosed".to_string();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.datetime_format = "%Y/%m/%".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_credentials_fallback_to_environment() {
        let config = ShipConfig::default();
        let creds = config
            .credentials_with(|name| match name {
                ACCESS_KEY_ENV => Some("env-access".to_string()),
                SECRET_KEY_ENV => Some("env-secret".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(creds.access_key, "env-access");
        assert_eq!(creds.secret_key, "env-secret");

        let explicit = valid_config()
            .credentials_with(|_| Some("ignored".to_string()))
            .unwrap();
        assert_eq!(explicit.access_key, "AKIA");
    }

    #[test]
    fn test_credentials_missing() {
        let config = ShipConfig::default();
        assert!(config.credentials_with(|_| None).is_err());

        let half = ShipConfig {
            access_key: Some("AKIA".to_string()),
            ..Default::default()
        };
        assert!(half.credentials_with(|_| None).is_err());
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let creds = valid_config().credentials_with(|_| None).unwrap();
        let shown = format!("{:?}", creds);
        assert!(!shown.contains("\"secret\""));
        assert!(shown.contains("<redacted>"));
    }

    #[test]
    fn test_snzip_mode_args() {
        assert_eq!(
            CompressionAlgorithm::SnzipHadoopSnappy
                .snzip_format()
                .unwrap()
                .mode_args(),
            &["-t", "hadoop-snappy"]
        );
        assert!(CompressionAlgorithm::SnzipFramingFormat
            .snzip_format()
            .unwrap()
            .mode_args()
            .is_empty());
        assert!(CompressionAlgorithm::Gzip.snzip_format().is_none());
    }

    #[test]
    fn test_toml_config_example() {
        let toml_str = r#"
log_dir = "/var/log/nginx"
path_pattern = ".*\\.1\\.gz$"
bucket = "my-logs"
app_dir = "web"
file_prefix = "host1"
compression = "python-snappy"
workers = 8
error_mode = "skip"
"#;
        let config: ShipConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.bucket, "my-logs");
        assert_eq!(config.compression, CompressionAlgorithm::Snappy);
        assert_eq!(config.workers, 8);
        assert_eq!(config.error_mode, ErrorMode::Skip);
        assert_eq!(config.queue_capacity, 1024);

        let config: ShipConfig = toml::from_str("compression = \"snzip-snappy-in-java\"").unwrap();
        assert_eq!(config.compression, CompressionAlgorithm::SnzipSnappyInJava);
    }

    #[test]
    fn test_scratch_dir() {
        let config = ShipConfig {
            tmp_dir: PathBuf::from("/data/tmp"),
            ..Default::default()
        };
        assert_eq!(config.scratch_dir(), PathBuf::from("/data/tmp/logship_temp"));
    }
}
