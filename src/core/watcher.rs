/*!
 * Recursive filesystem watch on the log directory
 */

use std::path::{Path, PathBuf};

use crossbeam_channel::{unbounded, Receiver};
use notify::event::{AccessKind, AccessMode, CreateKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::error::{Result, ShipError};

/// Filesystem notifications the pipeline reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchKind {
    /// A file was created
    Create,
    /// A file opened for writing was closed
    CloseWrite,
}

/// One qualifying filesystem notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub kind: WatchKind,
}

/// Map a raw notify event onto the kinds we ship on.
///
/// Close-after-write is always reported; file creation only when
/// `include_create` is set. Everything else is ignored.
pub fn classify(kind: &EventKind, include_create: bool) -> Option<WatchKind> {
    match kind {
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => Some(WatchKind::CloseWrite),
        EventKind::Create(CreateKind::File) | EventKind::Create(CreateKind::Any)
            if include_create =>
        {
            Some(WatchKind::Create)
        }
        _ => None,
    }
}

/// Recursive watch on the log directory.
///
/// Subdirectories created after the watch starts are picked up by the
/// backend. Events are delivered on an unbounded channel so the notify
/// thread never blocks on the pipeline.
pub struct LogWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
    events: Receiver<WatchEvent>,
}

impl LogWatcher {
    /// Start watching `root`. Fails if the directory is missing or cannot be
    /// watched.
    pub fn new(root: &Path, include_create: bool) -> Result<Self> {
        let root = root.to_path_buf();

        let metadata = std::fs::metadata(&root).map_err(|e| ShipError::Watch {
            root: root.clone(),
            detail: e.to_string(),
        })?;
        if !metadata.is_dir() {
            return Err(ShipError::Watch {
                root,
                detail: "not a directory".to_string(),
            });
        }

        let (tx, rx) = unbounded();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    let Some(kind) = classify(&event.kind, include_create) else {
                        return;
                    };
                    for path in event.paths {
                        debug!(path = %path.display(), ?kind, "Filesystem event");
                        if tx.send(WatchEvent { path, kind }).is_err() {
                            // Pipeline has stopped listening
                            return;
                        }
                    }
                }
                Err(e) => warn!("Watch error: {}", e),
            }
        })
        .map_err(|e| ShipError::Watch {
            root: root.clone(),
            detail: format!("Failed to create filesystem watcher: {}", e),
        })?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| ShipError::Watch {
                root: root.clone(),
                detail: e.to_string(),
            })?;

        Ok(Self {
            _watcher: watcher,
            root,
            events: rx,
        })
    }

    /// Get the path being watched
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stream of qualifying events. Disconnects when the watcher is dropped.
    pub fn events(&self) -> &Receiver<WatchEvent> {
        &self.events
    }
}
