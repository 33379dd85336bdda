/*!
 * logship CLI
 */

use clap::{Parser, ValueEnum};
use logship::{
    config::{CompressionAlgorithm, ErrorMode, LogLevel, ShipConfig},
    core::pipeline::{shutdown_channel, Pipeline, ShutdownHandle},
    core::watcher::LogWatcher,
    error::{Result, EXIT_SUCCESS},
    logging,
    stats::format_bytes,
};
use std::path::PathBuf;
use std::thread;
use tracing::{error, info, warn};

/// Exit status after a second interrupt while draining
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser)]
#[command(name = "logship")]
#[command(version, about = "Ship rotated log files to S3 as they are closed", long_about = None)]
struct Cli {
    /// TOML configuration file; command line options override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log dir to watch [default: /var/log/nginx]
    #[arg(short = 'd', long = "log-dir", value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Log name pattern, matched from the start of the full path [default: .*(.1.gz)$]
    #[arg(short = 'p', long = "path-pattern", value_name = "REGEX")]
    path_pattern: Option<String>,

    /// S3 bucket name
    #[arg(short = 'b', long = "aws-s3-bucket", value_name = "BUCKET")]
    bucket: Option<String>,

    /// Prefix for uploaded file names, e.g. the hostname. Random 8 characters if unset
    #[arg(short = 'f', long = "file-prefix", value_name = "PREFIX")]
    file_prefix: Option<String>,

    /// AWS access key, or AWS_ACCESS_KEY_ID from the environment
    #[arg(short = 'a', long = "aws-access-key", value_name = "KEY")]
    access_key: Option<String>,

    /// AWS secret key, or AWS_SECRET_ACCESS_KEY from the environment
    #[arg(short = 's', long = "aws-secret-key", value_name = "KEY")]
    secret_key: Option<String>,

    /// S3 storage class [default: REDUCED_REDUNDANCY]
    #[arg(short = 'S', long = "s3-storage-class", value_name = "CLASS")]
    storage_class: Option<String>,

    /// Directory inside the bucket for this app
    #[arg(short = 'A', long = "s3-app-dir", value_name = "DIR")]
    app_dir: Option<String>,

    /// snzip binary location, required for snzip-* compression
    #[arg(short = 'P', long = "snzip-path", value_name = "PATH")]
    snzip_path: Option<PathBuf>,

    /// Temporary directory for compression [default: /tmp]
    #[arg(short = 't', long = "tmp-compress", value_name = "DIR")]
    tmp_dir: Option<PathBuf>,

    /// Compression before upload [default: snappy]
    #[arg(short = 'C', long = "compression", value_enum)]
    compression: Option<CompressionArg>,

    /// strftime format of the date part of the key [default: %Y/%m/%d/%H/%M]
    #[arg(short = 'D', long = "datetime-format", value_name = "FORMAT")]
    datetime_format: Option<String>,

    /// AWS command line client used for uploads [default: aws]
    #[arg(long = "aws-cli", value_name = "PATH")]
    aws_cli: Option<PathBuf>,

    /// Number of upload workers [default: 4]
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Queued files before the watcher waits for workers, 0 = unbounded [default: 1024]
    #[arg(long, value_name = "N")]
    queue_capacity: Option<usize>,

    /// Also ship files on create events, not only when closed after writing
    #[arg(long = "on-create")]
    on_create: bool,

    /// What a failed file does to the pipeline [default: abort]
    #[arg(long = "error-mode", value_enum)]
    error_mode: Option<ErrorModeArg>,

    /// Log level [default: info]
    #[arg(long = "log-level", value_enum)]
    log_level: Option<LogLevelArg>,

    /// Write JSON logs to this file instead of stdout
    #[arg(long = "log", value_name = "FILE")]
    log: Option<PathBuf>,

    /// Debug logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum CompressionArg {
    Gzip,
    #[value(alias = "python-snappy")]
    Snappy,
    SnzipHadoopSnappy,
    SnzipFramingFormat,
    SnzipSnappyJava,
    SnzipSnappyInJava,
    SnzipRaw,
}

impl From<CompressionArg> for CompressionAlgorithm {
    fn from(arg: CompressionArg) -> Self {
        match arg {
            CompressionArg::Gzip => CompressionAlgorithm::Gzip,
            CompressionArg::Snappy => CompressionAlgorithm::Snappy,
            CompressionArg::SnzipHadoopSnappy => CompressionAlgorithm::SnzipHadoopSnappy,
            CompressionArg::SnzipFramingFormat => CompressionAlgorithm::SnzipFramingFormat,
            CompressionArg::SnzipSnappyJava => CompressionAlgorithm::SnzipSnappyJava,
            CompressionArg::SnzipSnappyInJava => CompressionAlgorithm::SnzipSnappyInJava,
            CompressionArg::SnzipRaw => CompressionAlgorithm::SnzipRaw,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum ErrorModeArg {
    Abort,
    Skip,
}

impl From<ErrorModeArg> for ErrorMode {
    fn from(arg: ErrorModeArg) -> Self {
        match arg {
            ErrorModeArg::Abort => ErrorMode::Abort,
            ErrorModeArg::Skip => ErrorMode::Skip,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

impl Cli {
    /// Config file (or defaults) with command line values applied on top
    fn into_config(self) -> Result<ShipConfig> {
        let mut config = match self.config {
            Some(ref path) => ShipConfig::from_file(path)?,
            None => ShipConfig::default(),
        };

        if let Some(v) = self.log_dir {
            config.log_dir = v;
        }
        if let Some(v) = self.path_pattern {
            config.path_pattern = v;
        }
        if let Some(v) = self.bucket {
            config.bucket = v;
        }
        if let Some(v) = self.file_prefix {
            config.file_prefix = Some(v);
        }
        if let Some(v) = self.access_key {
            config.access_key = Some(v);
        }
        if let Some(v) = self.secret_key {
            config.secret_key = Some(v);
        }
        if let Some(v) = self.storage_class {
            config.storage_class = v;
        }
        if let Some(v) = self.app_dir {
            config.app_dir = v;
        }
        if let Some(v) = self.snzip_path {
            config.snzip_path = Some(v);
        }
        if let Some(v) = self.tmp_dir {
            config.tmp_dir = v;
        }
        if let Some(v) = self.compression {
            config.compression = v.into();
        }
        if let Some(v) = self.datetime_format {
            config.datetime_format = v;
        }
        if let Some(v) = self.aws_cli {
            config.aws_cli = v;
        }
        if let Some(v) = self.workers {
            config.workers = v;
        }
        if let Some(v) = self.queue_capacity {
            config.queue_capacity = v;
        }
        if let Some(v) = self.error_mode {
            config.error_mode = v.into();
        }
        if let Some(v) = self.log_level {
            config.log_level = v.into();
        }
        if let Some(v) = self.log {
            config.log_file = Some(v);
        }
        config.trigger_on_create |= self.on_create;
        config.verbose |= self.verbose;

        Ok(config)
    }
}

fn main() {
    let code = match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            error!(category = %e.category(), "{}", e);
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run() -> Result<()> {
    let config = Cli::parse().into_config()?;

    if let Err(e) = logging::init_logging(&config) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    config.validate()?;
    let pipeline = Pipeline::from_config(&config)?;
    let watcher = LogWatcher::new(&config.log_dir, config.trigger_on_create)?;

    let (handle, signal) = shutdown_channel();
    spawn_interrupt_listener(handle)?;

    info!(
        compression = %config.compression,
        workers = config.workers,
        "Shipping to s3://{}/{}",
        config.bucket,
        config.app_dir
    );

    let stats = pipeline.run(&watcher, &signal)?;
    info!(
        "Shipped {} files ({})",
        stats.shipped,
        format_bytes(stats.bytes_shipped)
    );
    Ok(())
}

/// First interrupt drains the pipeline, a second one exits immediately
fn spawn_interrupt_listener(handle: ShutdownHandle) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    thread::Builder::new()
        .name("logship-signal".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to listen for interrupt: {}", e);
                    // Keep the handle alive so the pipeline does not see a shutdown
                    std::future::pending::<()>().await;
                }
                handle.trigger();

                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Second interrupt, exiting without draining");
                    std::process::exit(EXIT_INTERRUPTED);
                }
            });
        })?;

    Ok(())
}
