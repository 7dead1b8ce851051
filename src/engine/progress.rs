// Byte-budget progress aggregation shared by every task of one load session.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::error;

/// Receives the normalized session fraction in `[0, 1]`.
pub type ProgressCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// Clamp an arbitrary ratio into `[0, 1]`. Non-finite and negative values are 0.
pub fn clamp_fraction(value: f64) -> f64 {
    if !value.is_finite() || value < 0.0 {
        0.0
    } else {
        value.min(1.0)
    }
}

/// Integer percentage for a progress bar, floored and clamped to `0..=100`.
pub fn progress_percent(fraction: f64) -> u8 {
    (clamp_fraction(fraction) * 100.0).floor() as u8
}

/// Accumulates byte deltas against a fixed estimated total.
///
/// `loaded_bytes` only grows during a session, so the fraction is
/// non-decreasing no matter how deltas from concurrent tasks interleave.
/// The callback is invoked under a lock so observers see fractions in order;
/// it must not call `add_bytes` or `finish` on the same aggregator.
pub struct ProgressAggregator {
    total_bytes: u64,
    loaded_bytes: AtomicU64,
    finished: AtomicBool,
    last_reported: Mutex<f64>,
    callback: Option<ProgressCallback>,
}

impl ProgressAggregator {
    /// `total_estimated_bytes` is floored at 1 so the fraction is always defined.
    pub fn new(total_estimated_bytes: u64, callback: Option<ProgressCallback>) -> Self {
        Self {
            total_bytes: total_estimated_bytes.max(1),
            loaded_bytes: AtomicU64::new(0),
            finished: AtomicBool::new(false),
            last_reported: Mutex::new(0.0),
            callback,
        }
    }

    pub fn add_bytes(&self, delta: u64) -> f64 {
        self.loaded_bytes.fetch_add(delta, Ordering::AcqRel);

        let mut last = self.last_reported.lock();
        let fraction = self.fraction().max(*last);
        *last = fraction;
        self.report(fraction);
        fraction
    }

    /// Force the fraction to exactly 1.0 and report it.
    pub fn finish(&self) {
        self.finished.store(true, Ordering::Release);
        let mut last = self.last_reported.lock();
        *last = 1.0;
        self.report(1.0);
    }

    pub fn fraction(&self) -> f64 {
        if self.finished.load(Ordering::Acquire) {
            return 1.0;
        }
        let loaded = self.loaded_bytes.load(Ordering::Acquire);
        clamp_fraction(loaded as f64 / self.total_bytes as f64)
    }

    pub fn loaded_bytes(&self) -> u64 {
        self.loaded_bytes.load(Ordering::Acquire)
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    fn report(&self, fraction: f64) {
        if let Some(cb) = &self.callback {
            if catch_unwind(AssertUnwindSafe(|| cb(fraction))).is_err() {
                error!("progress callback panicked at fraction {:.3}", fraction);
            }
        }
    }
}
