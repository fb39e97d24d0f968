//! In-process action counters.
//!
//! Lock-free counters shared across concurrent requests. The binary logs a
//! snapshot on shutdown; tests assert on it.

use std::sync::atomic::{AtomicU64, Ordering};

use outlast_types::{ActionMetrics, ResultCode};

/// Action outcome counters.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    ok: AtomicU64,
    game_over: AtomicU64,
    conflicts: AtomicU64,
    failures: AtomicU64,
}

/// Point-in-time copy of [`InMemoryMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Calls that completed with `ok`.
    pub ok: u64,
    /// Calls that completed with `game_over`.
    pub game_over: u64,
    /// Calls that lost an optimistic-concurrency race.
    pub conflicts: u64,
    /// Calls that failed for any other reason.
    pub failures: u64,
}

impl MetricsSnapshot {
    /// Calls that completed, whatever the result code.
    pub const fn successes(&self) -> u64 {
        self.ok.saturating_add(self.game_over)
    }
}

impl InMemoryMetrics {
    /// All counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counter values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ok: self.ok.load(Ordering::Relaxed),
            game_over: self.game_over.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

impl ActionMetrics for InMemoryMetrics {
    fn record_success(&self, result_code: ResultCode) {
        let counter = match result_code {
            ResultCode::Ok => &self.ok,
            ResultCode::GameOver => &self.game_over,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_outcome() {
        let metrics = InMemoryMetrics::new();
        metrics.record_success(ResultCode::Ok);
        metrics.record_success(ResultCode::Ok);
        metrics.record_success(ResultCode::GameOver);
        metrics.record_conflict();
        metrics.record_failure();
        let snap = metrics.snapshot();
        assert_eq!(
            snap,
            MetricsSnapshot {
                ok: 2,
                game_over: 1,
                conflicts: 1,
                failures: 1,
            }
        );
        assert_eq!(snap.successes(), 3);
    }
}
