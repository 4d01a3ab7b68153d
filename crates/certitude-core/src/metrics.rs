//! Global atomic counters for Certitude observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a CLI command).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters.
pub struct Metrics {
    classifications: AtomicU64,
    successes: AtomicU64,
    halts: AtomicU64,
    generator_failures: AtomicU64,
    retries_scheduled: AtomicU64,
    cancellations: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            classifications: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            halts: AtomicU64::new(0),
            generator_failures: AtomicU64::new(0),
            retries_scheduled: AtomicU64::new(0),
            cancellations: AtomicU64::new(0),
        }
    }

    /// Count one gate classification and its verdict.
    pub fn inc_classification(&self, success: bool) {
        self.classifications.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.halts.fetch_add(1, Ordering::Relaxed);
        }
        tracing::trace!(metric = "classifications", success, "counter incremented");
    }

    pub fn inc_generator_failures(&self) {
        self.generator_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "generator_failures", "counter incremented");
    }

    pub fn inc_retries(&self) {
        self.retries_scheduled.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "retries_scheduled", "counter incremented");
    }

    pub fn inc_cancellations(&self) {
        self.cancellations.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "cancellations", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            classifications = self.classifications(),
            successes = self.successes(),
            halts = self.halts(),
            generator_failures = self.generator_failures(),
            retries_scheduled = self.retries_scheduled(),
            cancellations = self.cancellations(),
        );
    }

    pub fn classifications(&self) -> u64 {
        self.classifications.load(Ordering::Relaxed)
    }

    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn halts(&self) -> u64 {
        self.halts.load(Ordering::Relaxed)
    }

    pub fn generator_failures(&self) -> u64 {
        self.generator_failures.load(Ordering::Relaxed)
    }

    pub fn retries_scheduled(&self) -> u64 {
        self.retries_scheduled.load(Ordering::Relaxed)
    }

    pub fn cancellations(&self) -> u64 {
        self.cancellations.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.classifications.store(0, Ordering::Relaxed);
        self.successes.store(0, Ordering::Relaxed);
        self.halts.store(0, Ordering::Relaxed);
        self.generator_failures.store(0, Ordering::Relaxed);
        self.retries_scheduled.store(0, Ordering::Relaxed);
        self.cancellations.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_splits_by_verdict() {
        let m = Metrics::new();
        m.inc_classification(true);
        m.inc_classification(false);
        m.inc_classification(false);
        assert_eq!(m.classifications(), 3);
        assert_eq!(m.successes(), 1);
        assert_eq!(m.halts(), 2);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_classification(true);
        m.inc_generator_failures();
        m.inc_retries();
        m.inc_cancellations();
        m.reset();
        assert_eq!(m.classifications(), 0);
        assert_eq!(m.generator_failures(), 0);
        assert_eq!(m.retries_scheduled(), 0);
        assert_eq!(m.cancellations(), 0);
    }
}
