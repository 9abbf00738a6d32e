use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

/// Process-lifetime request counters. Never persisted.
#[derive(Debug)]
pub struct Statistics {
    total: AtomicU64,
    blocked: AtomicU64,
    last_update: AtomicU64,
    started: Instant,
    started_at: u64,
}

/// Point-in-time view handed to the settings UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    pub blocked: u64,
    pub total: u64,
    /// Percentage with one decimal, e.g. `"12.5%"`
    pub block_rate: String,
    /// Seconds since the engine was created
    pub run_time: u64,
    /// Epoch ms of the last list download in this process, 0 if none
    pub last_update: u64,
    pub start_time: u64,
}

impl Statistics {
    pub fn new(started_at: u64) -> Self {
        Self {
            total: AtomicU64::new(0),
            blocked: AtomicU64::new(0),
            last_update: AtomicU64::new(0),
            started: Instant::now(),
            started_at,
        }
    }

    pub fn inc_total(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_blocked(&self) {
        self.blocked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_last_update(&self, epoch_ms: u64) {
        self.last_update.store(epoch_ms, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        let total = self.total.load(Ordering::Relaxed);
        let blocked = self.blocked.load(Ordering::Relaxed);
        StatisticsSnapshot {
            blocked,
            total,
            block_rate: format_block_rate(blocked, total),
            run_time: self.started.elapsed().as_secs(),
            last_update: self.last_update.load(Ordering::Relaxed),
            start_time: self.started_at,
        }
    }
}

pub fn format_block_rate(blocked: u64, total: u64) -> String {
    if total == 0 {
        return "0%".to_string();
    }
    format!("{:.1}%", blocked as f64 / total as f64 * 100.0)
}
