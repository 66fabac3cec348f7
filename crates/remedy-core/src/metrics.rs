//! Process-wide atomic counters.
//!
//! Counters are incremented at the call site. [`Metrics::flush`] emits the
//! current values as a single `tracing::info!` record.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics instance.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    runs_started: AtomicU64,
    fixes_applied: AtomicU64,
    rollbacks: AtomicU64,
    merges: AtomicU64,
    sessions_spawned: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            runs_started: AtomicU64::new(0),
            fixes_applied: AtomicU64::new(0),
            rollbacks: AtomicU64::new(0),
            merges: AtomicU64::new(0),
            sessions_spawned: AtomicU64::new(0),
        }
    }

    pub fn inc_runs_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "runs_started", "counter incremented");
    }

    pub fn add_fixes_applied(&self, n: u64) {
        self.fixes_applied.fetch_add(n, Ordering::Relaxed);
        tracing::trace!(metric = "fixes_applied", n, "counter incremented");
    }

    pub fn inc_rollbacks(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "rollbacks", "counter incremented");
    }

    pub fn inc_merges(&self) {
        self.merges.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "merges", "counter incremented");
    }

    pub fn inc_sessions_spawned(&self) {
        self.sessions_spawned.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "sessions_spawned", "counter incremented");
    }

    /// Emit all counters as one `info!` record. Call at natural boundaries
    /// such as the end of a run.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            runs_started = self.runs_started(),
            fixes_applied = self.fixes_applied(),
            rollbacks = self.rollbacks(),
            merges = self.merges(),
            sessions_spawned = self.sessions_spawned(),
        );
    }

    pub fn runs_started(&self) -> u64 {
        self.runs_started.load(Ordering::Relaxed)
    }

    pub fn fixes_applied(&self) -> u64 {
        self.fixes_applied.load(Ordering::Relaxed)
    }

    pub fn rollbacks(&self) -> u64 {
        self.rollbacks.load(Ordering::Relaxed)
    }

    pub fn merges(&self) -> u64 {
        self.merges.load(Ordering::Relaxed)
    }

    pub fn sessions_spawned(&self) -> u64 {
        self.sessions_spawned.load(Ordering::Relaxed)
    }

    /// Reset all counters (tests).
    pub fn reset(&self) {
        self.runs_started.store(0, Ordering::Relaxed);
        self.fixes_applied.store(0, Ordering::Relaxed);
        self.rollbacks.store(0, Ordering::Relaxed);
        self.merges.store(0, Ordering::Relaxed);
        self.sessions_spawned.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_runs_started();
        m.add_fixes_applied(3);
        m.inc_rollbacks();
        m.inc_sessions_spawned();
        m.inc_sessions_spawned();
        assert_eq!(m.runs_started(), 1);
        assert_eq!(m.fixes_applied(), 3);
        assert_eq!(m.rollbacks(), 1);
        assert_eq!(m.merges(), 0);
        assert_eq!(m.sessions_spawned(), 2);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_runs_started();
        m.inc_merges();
        m.reset();
        assert_eq!(m.runs_started(), 0);
        assert_eq!(m.merges(), 0);
    }
}
