/*!
 * Shipping statistics and human readable formatting
 */

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters shared by all workers
#[derive(Debug, Default)]
pub struct ShipStats {
    shipped: AtomicU64,
    failed: AtomicU64,
    bytes_shipped: AtomicU64,
}

/// Point-in-time copy of [`ShipStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub shipped: u64,
    pub failed: u64,
    pub bytes_shipped: u64,
}

impl ShipStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_shipped(&self, bytes: u64) {
        self.shipped.fetch_add(1, Ordering::Relaxed);
        self.bytes_shipped.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            shipped: self.shipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            bytes_shipped: self.bytes_shipped.load(Ordering::Relaxed),
        }
    }
}

/// `1.50 KB`, `3.00 MB`; plain bytes below 1 KB
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["bytes", "KB", "MB", "GB", "TB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{:.2} {}", value, UNITS[unit])
}

/// Seconds with four decimals, e.g. `1.2345 sec`
pub fn format_duration(duration: Duration) -> String {
    format!("{:.4} sec", duration.as_secs_f64())
}
