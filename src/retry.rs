// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Exponential backoff policy for job retries.
//!
//! A failed attempt n (zero-based) sleeps `base * 2^n` before the job is
//! re-enqueued, capped to keep worst-case waits bounded.
//!
//! # Example
//!
//! ```
//! use index_sync::retry::BackoffPolicy;
//! use std::time::Duration;
//!
//! let policy = BackoffPolicy::new(Duration::from_secs(1));
//! assert_eq!(policy.delay_for(0), Duration::from_secs(1));
//! assert_eq!(policy.delay_for(2), Duration::from_secs(4));
//! ```

use std::time::Duration;

/// Exponential backoff with a cap.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub factor: f64,
    pub max: Duration,
}

impl BackoffPolicy {
    /// Doubling backoff from `base`, capped at 5 minutes.
    #[must_use]
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            factor: 2.0,
            max: Duration::from_secs(300),
        }
    }

    /// Delay before re-enqueueing after `retry_count` prior failures.
    #[must_use]
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let exp = self.factor.powi(retry_count.min(32) as i32);
        self.base.mul_f64(exp).min(self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubling_sequence() {
        let policy = BackoffPolicy::new(Duration::from_millis(100));
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(3), Duration::from_millis(800));
    }

    #[test]
    fn test_caps_at_max() {
        let policy = BackoffPolicy {
            base: Duration::from_secs(1),
            factor: 10.0,
            max: Duration::from_secs(5),
        };
        assert_eq!(policy.delay_for(3), Duration::from_secs(5));
    }

    #[test]
    fn test_large_retry_count_does_not_overflow() {
        let policy = BackoffPolicy::new(Duration::from_secs(1));
        assert_eq!(policy.delay_for(1000), Duration::from_secs(300));
    }
}
