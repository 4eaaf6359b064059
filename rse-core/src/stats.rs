//! Process-local statistics for id allocation and auth cache lookups.
//!
//! Each statistic is a `(total, subset)` pair packed into one `AtomicU64`
//! (total in the high half, subset in the low half). An increment that
//! would overflow either half first halves both, inside the same
//! compare-and-swap, so readers never observe a pair from two different
//! scales and the ratio survives the rescale.

use std::sync::atomic::{AtomicU64, Ordering};

/// A `(total, subset)` counter pair that rescales instead of overflowing.
#[derive(Debug, Default)]
pub struct RatioCounter {
    packed: AtomicU64,
}

/// A consistent reading of a [`RatioCounter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RatioSnapshot {
    pub total: u32,
    pub subset: u32,
}

impl RatioSnapshot {
    /// `subset / total`, or `0.0` before anything was recorded.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(self.subset) / f64::from(self.total)
        }
    }
}

fn pack(total: u32, subset: u32) -> u64 {
    (u64::from(total) << 32) | u64::from(subset)
}

fn unpack(packed: u64) -> (u32, u32) {
    ((packed >> 32) as u32, packed as u32)
}

impl RatioCounter {
    pub const fn new() -> Self {
        Self {
            packed: AtomicU64::new(0),
        }
    }

    /// Start from explicit values.
    pub fn with_values(total: u32, subset: u32) -> Self {
        Self {
            packed: AtomicU64::new(pack(total, subset)),
        }
    }

    /// Add to either half, halving both first if the addition would wrap.
    pub fn add(&self, total: u32, subset: u32) {
        // The closure always returns `Some`, so the update cannot fail.
        let _ = self
            .packed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                let (mut t, mut s) = unpack(current);
                if t.checked_add(total).is_none() || s.checked_add(subset).is_none() {
                    t /= 2;
                    s /= 2;
                }
                Some(pack(t.saturating_add(total), s.saturating_add(subset)))
            });
    }

    /// Record one sample; `hit` also bumps the subset.
    pub fn record(&self, hit: bool) {
        self.add(1, u32::from(hit));
    }

    pub fn snapshot(&self) -> RatioSnapshot {
        let (total, subset) = unpack(self.packed.load(Ordering::Acquire));
        RatioSnapshot { total, subset }
    }
}

/// Counters shared by every request handler in this process.
#[derive(Debug, Default)]
pub struct SharedCounters {
    /// `(allocation attempts, allocation retries)`.
    pub id_allocation: RatioCounter,
    /// `(auth cache lookups, auth cache hits)`.
    pub auth_cache: RatioCounter,
}

impl SharedCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_id_attempt(&self) {
        self.id_allocation.add(1, 0);
    }

    pub fn record_id_retry(&self) {
        self.id_allocation.add(0, 1);
    }

    pub fn record_auth_lookup(&self, hit: bool) {
        self.auth_cache.record(hit);
    }
}
