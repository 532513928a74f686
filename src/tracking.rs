//! Execution tracking: fuel accounting and cooperative cancellation
//!
//! A `Tracker` travels inside the `ExecutionContext`. When disabled (the
//! default) every call is a null check. When enabled it counts one unit of
//! fuel per emitted join row and can enforce a hard limit.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Raised when a query consumes more fuel than its configured limit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("fuel limit exceeded: used {used} of {limit}")]
pub struct FuelExceededError {
    pub used: u64,
    pub limit: u64,
}

struct TrackerInner {
    fuel_total: AtomicU64,
    /// 0 means count but never enforce.
    fuel_limit: u64,
    cancelled: AtomicBool,
}

/// Shared execution tracker. Cheap to clone (Arc inside, or nothing at all).
#[derive(Clone, Default)]
pub struct Tracker(Option<Arc<TrackerInner>>);

impl Tracker {
    /// Disabled tracker (zero overhead beyond a null check at call sites).
    #[inline]
    pub fn disabled() -> Self {
        Self(None)
    }

    /// Tracker that counts fuel without enforcing a limit.
    pub fn counting() -> Self {
        Self::with_fuel_limit(0)
    }

    /// Tracker with a hard fuel limit. A limit of 0 counts without enforcing.
    pub fn with_fuel_limit(limit: u64) -> Self {
        Self(Some(Arc::new(TrackerInner {
            fuel_total: AtomicU64::new(0),
            fuel_limit: limit,
            cancelled: AtomicBool::new(false),
        })))
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.0.is_some()
    }

    /// Total fuel consumed so far (0 when disabled).
    pub fn fuel_used(&self) -> u64 {
        self.0
            .as_ref()
            .map(|i| i.fuel_total.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Consume one unit of fuel.
    ///
    /// Charged once per row at each stage that realizes it: operators call
    /// this per emitted row, and materialization per row drained into the
    /// table. Allows exactly `limit` units; errors when the total becomes
    /// `limit + 1`.
    #[inline]
    pub fn consume_fuel_one(&self) -> Result<(), FuelExceededError> {
        let Some(inner) = &self.0 else {
            return Ok(());
        };
        let new_total = inner.fuel_total.fetch_add(1, Ordering::Relaxed) + 1;
        if inner.fuel_limit > 0 && new_total == inner.fuel_limit + 1 {
            return Err(FuelExceededError {
                used: new_total,
                limit: inner.fuel_limit,
            });
        }
        Ok(())
    }

    /// Request cooperative cancellation.
    ///
    /// Operators that observe the flag stop producing and report exhaustion
    /// rather than an error. A consumer that cancels must still close the
    /// operator tree.
    pub fn request_cancel(&self) {
        if let Some(inner) = &self.0 {
            inner.cancelled.store(true, Ordering::Relaxed);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.0
            .as_ref()
            .map(|i| i.cancelled.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_tracker_never_errors() {
        let t = Tracker::disabled();
        for _ in 0..10_000 {
            t.consume_fuel_one().unwrap();
        }
        assert_eq!(t.fuel_used(), 0);
        assert!(!t.is_enabled());
    }

    #[test]
    fn fuel_limit_allows_exactly_limit() {
        let t = Tracker::with_fuel_limit(3);
        t.consume_fuel_one().unwrap();
        t.consume_fuel_one().unwrap();
        t.consume_fuel_one().unwrap();
        let err = t.consume_fuel_one().unwrap_err();
        assert_eq!(err.used, 4);
        assert_eq!(err.limit, 3);
    }

    #[test]
    fn zero_limit_counts_without_enforcing() {
        let t = Tracker::counting();
        for _ in 0..100 {
            t.consume_fuel_one().unwrap();
        }
        assert_eq!(t.fuel_used(), 100);
    }

    #[test]
    fn cancel_flag_round_trip() {
        let t = Tracker::counting();
        assert!(!t.is_cancelled());
        t.request_cancel();
        assert!(t.is_cancelled());

        // Disabled tracker silently ignores cancellation requests.
        let d = Tracker::disabled();
        d.request_cancel();
        assert!(!d.is_cancelled());
    }
}
