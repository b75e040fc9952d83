//! Counters for the enumeration filter.
//!
//! All counters are lock-free atomics updated from inside enumeration calls.
//!
//! # Usage
//!
//! ```
//! use veil_core::stats::FilterStats;
//!
//! let stats = FilterStats::new();
//! stats.record_enumeration();
//! stats.record_suppressed();
//! stats.record_cache_miss();
//!
//! let snapshot = stats.snapshot();
//! assert_eq!(snapshot.suppressed, 1);
//! assert_eq!(snapshot.forwarded, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for filtered directory enumerations.
#[derive(Debug, Default)]
pub struct FilterStats {
    /// Number of enumerations routed through the filter.
    pub enumerations: AtomicU64,
    /// Entries passed on to the caller's callback.
    pub forwarded: AtomicU64,
    /// Entries withheld because they resolve to a concealed object.
    pub suppressed: AtomicU64,
    /// Entries whose name was not in the dentry cache (forwarded unchecked).
    pub cache_misses: AtomicU64,
}

impl FilterStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_enumeration(&self) {
        self.enumerations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_suppressed(&self) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a dentry cache miss. The entry is forwarded, so this also counts
    /// towards [`forwarded`](Self::forwarded).
    #[inline]
    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
        self.record_forwarded();
    }

    /// Takes a point-in-time copy of every counter.
    pub fn snapshot(&self) -> FilterStatsSnapshot {
        FilterStatsSnapshot {
            enumerations: self.enumerations.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`FilterStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStatsSnapshot {
    pub enumerations: u64,
    pub forwarded: u64,
    pub suppressed: u64,
    pub cache_misses: u64,
}

impl FilterStatsSnapshot {
    /// Fraction of inspected entries that missed the dentry cache (0.0 to 1.0).
    ///
    /// Returns 0.0 if no entries were inspected.
    pub fn miss_rate(&self) -> f64 {
        let inspected = self.forwarded + self.suppressed;
        if inspected == 0 {
            0.0
        } else {
            self.cache_misses as f64 / inspected as f64
        }
    }
}
