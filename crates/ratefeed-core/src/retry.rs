//! Retry policy and backoff windows.

use std::time::Duration;

/// Delay strategy between failed attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Same delay after every failure.
    Fixed {
        delay: Duration,
    },
    /// Uniformly random delay in `[min, max]`.
    Uniform {
        min: Duration,
        max: Duration,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Uniform {
            min: Duration::from_secs(3),
            max: Duration::from_secs(5),
        }
    }
}

impl Backoff {
    /// No waiting at all; used by tests.
    pub const fn none() -> Self {
        Self::Fixed {
            delay: Duration::ZERO,
        }
    }

    /// Delay before the next attempt. A reversed window is treated as its minimum.
    pub fn delay(self) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Uniform { min, max } => uniform_between(min, max),
        }
    }
}

/// Uniformly random duration in `[min, max]` with millisecond resolution.
pub fn uniform_between(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let low = min.as_millis().min(u128::from(u64::MAX)) as u64;
    let high = max.as_millis().min(u128::from(u64::MAX)) as u64;
    Duration::from_millis(fastrand::u64(low..=high))
}

/// How many times a fetch is attempted and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, first one included. Never below one.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::default(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Default attempt count with no sleeping between attempts.
    pub fn instant() -> Self {
        Self::new(3, Backoff::none())
    }

    /// Whether attempt `attempt` (1-based) is followed by another one.
    pub const fn has_next(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_three_attempts_three_to_five_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        for _ in 0..50 {
            let delay = policy.backoff.delay();
            assert!(delay >= Duration::from_secs(3), "{delay:?}");
            assert!(delay <= Duration::from_secs(5), "{delay:?}");
        }
    }

    #[test]
    fn reversed_window_uses_minimum() {
        let backoff = Backoff::Uniform {
            min: Duration::from_millis(900),
            max: Duration::from_millis(100),
        };
        assert_eq!(backoff.delay(), Duration::from_millis(900));
    }

    #[test]
    fn has_next_stops_at_last_attempt() {
        let policy = RetryPolicy::instant();
        assert!(policy.has_next(1));
        assert!(policy.has_next(2));
        assert!(!policy.has_next(3));
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Backoff::none()).max_attempts, 1);
    }
}
