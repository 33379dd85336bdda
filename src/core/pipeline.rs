/*!
 * Pipeline coordinator: watcher -> matcher -> queue -> workers
 *
 * A single intake loop matches events and pushes them onto the dispatch
 * queue. A fixed pool of worker threads pops paths and runs one
 * [`ProcessingTask`] per path: compress, name, upload, clean up.
 */

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam_channel::{select, unbounded, Receiver, Sender};
use tracing::{debug, error, info, warn};

use super::filter::{MatchedPath, PathMatcher};
use super::naming::{KeyNamer, PrefixPolicy};
use super::queue::{dispatch_queue, QueueConsumer};
use super::watcher::{LogWatcher, WatchEvent};
use crate::compression::{Artifact, Compressor};
use crate::config::{ErrorMode, ShipConfig};
use crate::error::{Result, ShipError};
use crate::stats::{format_bytes, format_duration, ShipStats, StatsSnapshot};
use crate::upload::{AwsCliUploader, UploadOutcome, UploadTarget, Uploader};

/// Lifecycle of one matched path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Queued,
    Compressing,
    Naming,
    Uploading,
    Cleaned,
    Failed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Queued => "queued",
            TaskState::Compressing => "compressing",
            TaskState::Naming => "naming",
            TaskState::Uploading => "uploading",
            TaskState::Cleaned => "cleaned",
            TaskState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What a finished task did
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub source: PathBuf,
    pub artifact: Artifact,
    pub target: UploadTarget,
    pub outcome: UploadOutcome,
}

/// Everything a task needs, shared read-only by all workers
struct TaskContext {
    compressor: Compressor,
    namer: KeyNamer,
    uploader: Box<dyn Uploader>,
    bucket: String,
    stats: ShipStats,
}

/// The unit of work bound to one matched path
pub struct ProcessingTask {
    source: MatchedPath,
    state: TaskState,
}

impl ProcessingTask {
    pub fn new(source: MatchedPath) -> Self {
        Self {
            source,
            state: TaskState::Queued,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    fn transition(&mut self, next: TaskState) {
        debug!(
            path = %self.source.as_path().display(),
            "Task {} -> {}",
            self.state,
            next
        );
        self.state = next;
    }

    fn run(&mut self, ctx: &TaskContext) -> Result<TaskReport> {
        let source = self.source.as_path().to_path_buf();
        let start = Instant::now();

        self.transition(TaskState::Compressing);
        let artifact = match ctx.compressor.compress(&source) {
            Ok(artifact) => artifact,
            Err(e) => {
                self.transition(TaskState::Failed);
                error!(
                    path = %source.display(),
                    algorithm = %ctx.compressor.label(),
                    elapsed = %format_duration(start.elapsed()),
                    category = %e.category(),
                    "Compression failed: {}",
                    e
                );
                return Err(e);
            }
        };

        self.transition(TaskState::Naming);
        let target = UploadTarget::new(&ctx.bucket, ctx.namer.build_key(&artifact.name));

        self.transition(TaskState::Uploading);
        let outcome = ctx.uploader.upload(&artifact.path, &target);

        if !outcome.succeeded {
            self.transition(TaskState::Failed);
            let detail = outcome
                .error_detail
                .clone()
                .unwrap_or_else(|| "upload failed".to_string());
            error!(
                path = %source.display(),
                artifact = %artifact.path.display(),
                algorithm = %ctx.compressor.label(),
                destination = %target,
                duration = %format_duration(outcome.duration),
                "Error sending file: {}",
                detail
            );
            return Err(ShipError::Upload {
                path: artifact.path.clone(),
                destination: target.locator(),
                detail,
            });
        }

        info!(
            path = %artifact.path.display(),
            "Sending to {} SUCCESS! {} in {}",
            target,
            format_bytes(outcome.size_bytes),
            format_duration(outcome.duration)
        );

        cleanup(&artifact);
        self.transition(TaskState::Cleaned);
        ctx.stats.record_shipped(outcome.size_bytes);

        Ok(TaskReport {
            source,
            artifact,
            target,
            outcome,
        })
    }
}

/// Remove the uploaded artifact and the decompressed intermediate, if any.
///
/// Missing files are not an error; a removal failure is logged and left for
/// the operator.
pub fn cleanup(artifact: &Artifact) {
    remove_if_file(&artifact.path);
    if let Some(intermediate) = &artifact.intermediate {
        if intermediate != &artifact.path {
            remove_if_file(intermediate);
        }
    }
}

fn remove_if_file(path: &Path) {
    if path.is_file() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(path = %path.display(), "Failed to remove local file: {}", e);
        }
    }
}

/// Create a shutdown pair. Triggering the handle puts the pipeline into
/// draining; dropping every handle without triggering leaves it running.
pub fn shutdown_channel() -> (ShutdownHandle, ShutdownSignal) {
    let (tx, rx) = unbounded();
    (ShutdownHandle { tx }, ShutdownSignal { rx })
}

#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Sender<()>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

pub struct ShutdownSignal {
    rx: Receiver<()>,
}

/// Wires matcher, queue, compressor, namer and uploader together and owns
/// the concurrency and failure policy.
pub struct Pipeline {
    ctx: Arc<TaskContext>,
    matcher: PathMatcher,
    workers: usize,
    queue_capacity: usize,
    error_mode: ErrorMode,
}

impl Pipeline {
    /// Pipeline uploading through the AWS command line client
    pub fn from_config(config: &ShipConfig) -> Result<Self> {
        let uploader = AwsCliUploader::from_config(config)?;
        Self::new(config, Box::new(uploader))
    }

    pub fn new(config: &ShipConfig, uploader: Box<dyn Uploader>) -> Result<Self> {
        config.validate()?;

        let ctx = TaskContext {
            compressor: Compressor::from_config(config)?,
            namer: KeyNamer::new(
                &config.app_dir,
                &config.datetime_format,
                PrefixPolicy::from_option(config.file_prefix.as_deref()),
            ),
            uploader,
            bucket: config.bucket.clone(),
            stats: ShipStats::new(),
        };

        Ok(Self {
            ctx: Arc::new(ctx),
            matcher: PathMatcher::new(&config.path_pattern)?,
            workers: config.workers,
            queue_capacity: config.queue_capacity,
            error_mode: config.error_mode,
        })
    }

    pub fn matcher(&self) -> &PathMatcher {
        &self.matcher
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.ctx.stats.snapshot()
    }

    /// Run one task to completion on the calling thread
    pub fn process(&self, path: MatchedPath) -> Result<TaskReport> {
        let result = ProcessingTask::new(path).run(&self.ctx);
        if result.is_err() {
            self.ctx.stats.record_failed();
        }
        result
    }

    /// Ship files reported by `watcher` until shutdown or a fatal failure
    pub fn run(&self, watcher: &LogWatcher, shutdown: &ShutdownSignal) -> Result<StatsSnapshot> {
        info!(
            root = %watcher.root().display(),
            pattern = %self.matcher.pattern(),
            "Watching for files"
        );
        self.run_events(watcher.events(), shutdown)
    }

    /// Intake loop over an event stream.
    ///
    /// Returns when the stream disconnects, shutdown is signalled, or (in
    /// abort mode) a task fails. Tasks already running finish before this
    /// returns; in abort mode paths still queued are dropped.
    pub fn run_events(
        &self,
        events: &Receiver<WatchEvent>,
        shutdown: &ShutdownSignal,
    ) -> Result<StatsSnapshot> {
        let (producer, consumer) = dispatch_queue(self.queue_capacity);
        let (failure_tx, failure_rx) = unbounded::<ShipError>();
        let aborted = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::with_capacity(self.workers);
        for id in 0..self.workers {
            let ctx = self.ctx.clone();
            let consumer = consumer.clone();
            let failures = failure_tx.clone();
            let aborted = aborted.clone();
            let error_mode = self.error_mode;

            let handle = thread::Builder::new()
                .name(format!("logship-worker-{}", id))
                .spawn(move || worker_loop(&ctx, consumer, failures, &aborted, error_mode))?;
            handles.push(handle);
        }
        drop(consumer);
        drop(failure_tx);

        let never = crossbeam_channel::never();
        let mut listen_for_shutdown = true;

        let mut first_error = loop {
            let shutdown_rx = if listen_for_shutdown {
                &shutdown.rx
            } else {
                &never
            };

            select! {
                recv(events) -> event => match event {
                    Ok(event) => {
                        debug!(path = %event.path.display(), kind = ?event.kind, "Event received");
                        if let Some(path) = self.matcher.accept(event.path) {
                            if producer.push(path).is_err() {
                                break Some(ShipError::Shutdown);
                            }
                        }
                    }
                    Err(_) => {
                        info!("Watcher stopped, draining queued files");
                        break None;
                    }
                },
                recv(shutdown_rx) -> msg => match msg {
                    Ok(()) => {
                        info!(queued = producer.len(), "Interrupt received, draining queued files");
                        break None;
                    }
                    Err(_) => listen_for_shutdown = false,
                },
                recv(failure_rx) -> failure => {
                    // Disconnected means every worker has exited
                    break Some(failure.unwrap_or(ShipError::Shutdown));
                },
            }
        };

        if first_error.is_some() {
            aborted.store(true, Ordering::SeqCst);
        }
        drop(producer);

        for handle in handles {
            if handle.join().is_err() {
                error!("Worker thread panicked");
            }
        }

        if first_error.is_none() {
            first_error = failure_rx.try_recv().ok();
        }

        let stats = self.ctx.stats.snapshot();
        info!(
            shipped = stats.shipped,
            failed = stats.failed,
            bytes = %format_bytes(stats.bytes_shipped),
            "Pipeline stopped"
        );

        match first_error {
            Some(err) => Err(err),
            None => Ok(stats),
        }
    }
}

fn worker_loop(
    ctx: &TaskContext,
    consumer: QueueConsumer,
    failures: Sender<ShipError>,
    aborted: &AtomicBool,
    error_mode: ErrorMode,
) {
    while let Some(path) = consumer.pop() {
        if aborted.load(Ordering::SeqCst) {
            warn!(path = %path.as_path().display(), "Pipeline aborted, dropping queued file");
            continue;
        }

        if let Err(err) = ProcessingTask::new(path).run(ctx) {
            ctx.stats.record_failed();
            // Skip mode only tolerates failures confined to one file
            if error_mode == ErrorMode::Skip && err.is_task_failure() {
                warn!("Continuing after failure: {}", err);
            } else {
                aborted.store(true, Ordering::SeqCst);
                let _ = failures.send(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompressionAlgorithm;
    use crate::core::watcher::WatchKind;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    /// Records every upload and answers with a fixed status
    struct FakeUploader {
        succeed: bool,
        calls: Arc<Mutex<Vec<(PathBuf, UploadTarget)>>>,
    }

    impl Uploader for FakeUploader {
        fn upload(&self, artifact: &Path, target: &UploadTarget) -> UploadOutcome {
            self.calls
                .lock()
                .unwrap()
                .push((artifact.to_path_buf(), target.clone()));
            let size = std::fs::metadata(artifact).map(|m| m.len()).unwrap_or(0);
            if self.succeed {
                UploadOutcome::success(Duration::from_millis(1), size)
            } else {
                UploadOutcome::failure(Duration::from_millis(1), size, "exit status: 1")
            }
        }
    }

    fn config(dir: &TempDir, compression: CompressionAlgorithm) -> ShipConfig {
        ShipConfig {
            log_dir: dir.path().to_path_buf(),
            path_pattern: r".*\.log\.1$".to_string(),
            bucket: "bucket".to_string(),
            app_dir: "app".to_string(),
            file_prefix: Some("host1".to_string()),
            access_key: Some("a".to_string()),
            secret_key: Some("s".to_string()),
            tmp_dir: dir.path().join("tmp"),
            compression,
            workers: 2,
            ..Default::default()
        }
    }

    fn pipeline(
        config: &ShipConfig,
        succeed: bool,
    ) -> (Pipeline, Arc<Mutex<Vec<(PathBuf, UploadTarget)>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let uploader = FakeUploader {
            succeed,
            calls: calls.clone(),
        };
        (Pipeline::new(config, Box::new(uploader)).unwrap(), calls)
    }

    #[test]
    fn test_task_success_cleans_up() {
        let dir = tempdir().unwrap();
        let config = config(&dir, CompressionAlgorithm::Snappy);
        let (pipeline, calls) = pipeline(&config, true);

        let source = dir.path().join("access.log.1");
        std::fs::write(&source, b"GET /\n").unwrap();
        let matched = pipeline.matcher().accept(source.clone()).unwrap();

        let report = pipeline.process(matched).unwrap();
        assert_eq!(report.source, source);
        assert!(report.outcome.succeeded);
        assert!(report.target.key.starts_with("app/"));
        assert!(report.target.key.ends_with("/host1_access.log.1.snappy"));
        assert!(!report.artifact.path.exists());
        // Source is not the artifact, so it stays
        assert!(source.exists());
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert_eq!(pipeline.stats().shipped, 1);
    }

    #[test]
    fn test_task_failure_keeps_artifact() {
        let dir = tempdir().unwrap();
        let config = config(&dir, CompressionAlgorithm::Snappy);
        let (pipeline, _calls) = pipeline(&config, false);

        let source = dir.path().join("access.log.1");
        std::fs::write(&source, b"GET /\n").unwrap();
        let matched = pipeline.matcher().accept(source).unwrap();

        let err = pipeline.process(matched).unwrap_err();
        match &err {
            ShipError::Upload {
                path, destination, ..
            } => {
                assert!(path.exists());
                assert!(destination.starts_with("s3://bucket/app/"));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(err.exit_code(), crate::error::EXIT_TASK_FAILED);
        assert_eq!(pipeline.stats().failed, 1);
    }

    #[test]
    fn test_cleanup_removes_intermediate() {
        let dir = tempdir().unwrap();
        let artifact_path = dir.path().join("a.log.1.snappy");
        let intermediate = dir.path().join("a.log.1");
        std::fs::write(&artifact_path, b"x").unwrap();
        std::fs::write(&intermediate, b"y").unwrap();

        cleanup(&Artifact {
            path: artifact_path.clone(),
            name: "a.log.1.snappy".to_string(),
            size_bytes: 1,
            intermediate: Some(intermediate.clone()),
        });
        assert!(!artifact_path.exists());
        assert!(!intermediate.exists());

        // Second cleanup of missing files is a no-op
        cleanup(&Artifact {
            path: artifact_path,
            name: "a.log.1.snappy".to_string(),
            size_bytes: 1,
            intermediate: Some(intermediate),
        });
    }

    #[test]
    fn test_task_states() {
        let dir = tempdir().unwrap();
        let config = config(&dir, CompressionAlgorithm::Gzip);
        let (pipeline, _) = pipeline(&config, true);

        let source = dir.path().join("x.log.1");
        std::fs::write(&source, b"x").unwrap();
        let mut task = ProcessingTask::new(pipeline.matcher().accept(source).unwrap());
        assert_eq!(task.state(), TaskState::Queued);
        task.run(&pipeline.ctx).unwrap();
        assert_eq!(task.state(), TaskState::Cleaned);

        let mut missing = ProcessingTask::new(
            pipeline
                .matcher()
                .accept(dir.path().join("gone.log.1"))
                .unwrap(),
        );
        assert!(missing.run(&pipeline.ctx).is_err());
        assert_eq!(missing.state(), TaskState::Failed);
    }

    #[test]
    fn test_run_events_stops_when_stream_closes() {
        let dir = tempdir().unwrap();
        let config = config(&dir, CompressionAlgorithm::Gzip);
        let (pipeline, calls) = pipeline(&config, true);
        let (_handle, signal) = shutdown_channel();

        let (tx, rx) = unbounded();
        for i in 0..5 {
            let path = dir.path().join(format!("f{}.log.1", i));
            std::fs::write(&path, format!("line {}\n", i)).unwrap();
            tx.send(WatchEvent {
                path,
                kind: WatchKind::CloseWrite,
            })
            .unwrap();
        }
        // Not matched, never uploaded
        tx.send(WatchEvent {
            path: dir.path().join("f.log.2"),
            kind: WatchKind::CloseWrite,
        })
        .unwrap();
        drop(tx);

        let stats = pipeline.run_events(&rx, &signal).unwrap();
        assert_eq!(stats.shipped, 5);
        assert_eq!(calls.lock().unwrap().len(), 5);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(TaskState::Compressing.to_string(), "compressing");
        assert_eq!(TaskState::Cleaned.to_string(), "cleaned");
    }
}
