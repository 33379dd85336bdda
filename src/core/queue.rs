/*!
 * FIFO hand-off between event intake and the workers
 */

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

use super::filter::MatchedPath;
use crate::error::{Result, ShipError};

/// Create a dispatch queue.
///
/// `capacity == 0` gives an unbounded queue where `push` never blocks. Any
/// other value bounds the queue and `push` blocks while it is full, which
/// pushes back on the watcher instead of growing without limit.
pub fn dispatch_queue(capacity: usize) -> (QueueProducer, QueueConsumer) {
    let (tx, rx) = if capacity == 0 {
        unbounded()
    } else {
        bounded(capacity)
    };
    (QueueProducer { tx }, QueueConsumer { rx })
}

/// Push side, held by the watcher. The queue shuts down once every
/// producer is dropped.
#[derive(Clone)]
pub struct QueueProducer {
    tx: Sender<MatchedPath>,
}

impl QueueProducer {
    /// Fails only when every consumer is gone
    pub fn push(&self, path: MatchedPath) -> Result<()> {
        self.tx.send(path).map_err(|_| ShipError::Shutdown)
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

/// Pop side, shared by the workers. Each item is delivered to exactly one
/// consumer.
#[derive(Clone)]
pub struct QueueConsumer {
    rx: Receiver<MatchedPath>,
}

impl QueueConsumer {
    /// Block until an item is available. Returns `None` once the queue is
    /// shut down and drained.
    pub fn pop(&self) -> Option<MatchedPath> {
        self.rx.recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
