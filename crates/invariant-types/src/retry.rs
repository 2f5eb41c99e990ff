use crate::error::DomainError;
use crate::execution_error::ExecutionError;
use chrono::Duration;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// How much random jitter to apply to a computed backoff delay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JitterMode {
    /// Use the computed delay exactly.
    None,
    /// Sample uniformly from `[delay/2, delay]`.
    Half,
    /// Sample uniformly from `[1s, delay]`.
    Full,
}

/// Pure function of `(error, attempt) -> {retry(delay) | fail}`.
///
/// `attempt` is the 1-indexed attempt number that just failed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// Never retry.
    None,
    /// Retry up to `max_attempts` times with a constant delay.
    Fixed { max_attempts: u32, delay: Duration },
    /// Retry up to `max_attempts` times with exponentially growing delay.
    Exponential {
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
        jitter: JitterMode,
    },
}

/// Outcome of consulting a [`RetryPolicy`] after a failure.
#[derive(Clone, Debug, PartialEq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    Fail,
}

const MIN_DELAY: Duration = Duration::seconds(1);

impl RetryPolicy {
    /// `EXP(6, 2s, 60s, 2.0, HALF)`, the default used when a step does not
    /// specify its own policy.
    pub fn default_policy() -> Self {
        Self::exponential(6, Duration::seconds(2), Duration::seconds(60), 2.0, JitterMode::Half)
            .expect("default retry policy parameters are valid")
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Result<Self, DomainError> {
        if max_attempts == 0 {
            return Err(DomainError::InvalidRetryMaxAttempts { max_attempts });
        }
        if delay < Duration::zero() {
            return Err(DomainError::InvalidRetryDelay {
                base_secs: delay.num_seconds(),
                max_secs: delay.num_seconds(),
            });
        }
        Ok(Self::Fixed { max_attempts, delay })
    }

    pub fn exponential(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
        jitter: JitterMode,
    ) -> Result<Self, DomainError> {
        if max_attempts == 0 {
            return Err(DomainError::InvalidRetryMaxAttempts { max_attempts });
        }
        if base_delay < Duration::zero() || max_delay < base_delay {
            return Err(DomainError::InvalidRetryDelay {
                base_secs: base_delay.num_seconds(),
                max_secs: max_delay.num_seconds(),
            });
        }
        if multiplier <= 0.0 {
            return Err(DomainError::InvalidRetryMultiplier { multiplier });
        }
        Ok(Self::Exponential {
            max_attempts,
            base_delay,
            max_delay,
            multiplier,
            jitter,
        })
    }

    fn max_attempts(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Fixed { max_attempts, .. } => *max_attempts,
            Self::Exponential { max_attempts, .. } => *max_attempts,
        }
    }

    /// Decide whether `attempt` (the attempt number that just failed) should
    /// be retried, and if so after what delay.
    ///
    /// `error` is accepted for symmetry with the base definition (a future
    /// policy could discriminate on [`ExecutionError::kind`]) but the
    /// built-in families here are error-agnostic.
    pub fn decide(&self, _error: &ExecutionError, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts() {
            return RetryDecision::Fail;
        }
        match self {
            Self::None => RetryDecision::Fail,
            Self::Fixed { delay, .. } => RetryDecision::Retry {
                delay: clamp_min(*delay),
            },
            Self::Exponential {
                base_delay,
                max_delay,
                multiplier,
                jitter,
                ..
            } => {
                let scaled_ms =
                    (base_delay.num_milliseconds() as f64) * multiplier.powi(attempt as i32 - 1);
                let computed = Duration::milliseconds(scaled_ms.min(i64::MAX as f64) as i64);
                let capped = if computed > *max_delay { *max_delay } else { computed };
                RetryDecision::Retry {
                    delay: clamp_min(apply_jitter(capped, *jitter)),
                }
            }
        }
    }
}

fn clamp_min(delay: Duration) -> Duration {
    if delay < MIN_DELAY { MIN_DELAY } else { delay }
}

fn apply_jitter(delay: Duration, mode: JitterMode) -> Duration {
    match mode {
        JitterMode::None => delay,
        JitterMode::Half => {
            let lo = delay.num_milliseconds() / 2;
            let hi = delay.num_milliseconds().max(lo + 1);
            Duration::milliseconds(rand::rng().random_range(lo..=hi))
        }
        JitterMode::Full => {
            let lo = MIN_DELAY.num_milliseconds();
            let hi = delay.num_milliseconds().max(lo + 1);
            Duration::milliseconds(rand::rng().random_range(lo..=hi))
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::default_policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution_error::ErrorKind;

    fn err() -> ExecutionError {
        ExecutionError::new(ErrorKind::Trap, "boom")
    }

    #[test]
    fn none_always_fails() {
        let p = RetryPolicy::None;
        assert_eq!(p.decide(&err(), 1), RetryDecision::Fail);
    }

    #[test]
    fn fixed_retries_until_max_attempts() {
        let p = RetryPolicy::fixed(3, Duration::seconds(5)).unwrap();
        assert!(matches!(p.decide(&err(), 1), RetryDecision::Retry { .. }));
        assert!(matches!(p.decide(&err(), 2), RetryDecision::Retry { .. }));
        assert_eq!(p.decide(&err(), 3), RetryDecision::Fail);
    }

    #[test]
    fn exponential_with_no_jitter_doubles_each_attempt() {
        let p = RetryPolicy::exponential(
            5,
            Duration::seconds(1),
            Duration::seconds(60),
            2.0,
            JitterMode::None,
        )
        .unwrap();
        let RetryDecision::Retry { delay: d1 } = p.decide(&err(), 1) else {
            panic!("expected retry")
        };
        let RetryDecision::Retry { delay: d2 } = p.decide(&err(), 2) else {
            panic!("expected retry")
        };
        assert_eq!(d1, Duration::seconds(1));
        assert_eq!(d2, Duration::seconds(2));
    }

    #[test]
    fn exponential_caps_at_max_delay() {
        let p = RetryPolicy::exponential(
            10,
            Duration::seconds(1),
            Duration::seconds(5),
            10.0,
            JitterMode::None,
        )
        .unwrap();
        let RetryDecision::Retry { delay } = p.decide(&err(), 4) else {
            panic!("expected retry")
        };
        assert_eq!(delay, Duration::seconds(5));
    }

    #[test]
    fn delay_is_never_below_one_second() {
        let p = RetryPolicy::fixed(2, Duration::milliseconds(10)).unwrap();
        let RetryDecision::Retry { delay } = p.decide(&err(), 1) else {
            panic!("expected retry")
        };
        assert_eq!(delay, Duration::seconds(1));
    }

    #[test]
    fn zero_max_attempts_is_rejected() {
        assert!(matches!(
            RetryPolicy::fixed(0, Duration::seconds(1)),
            Err(DomainError::InvalidRetryMaxAttempts { .. })
        ));
    }

    #[test]
    fn non_positive_multiplier_is_rejected() {
        assert!(matches!(
            RetryPolicy::exponential(
                3,
                Duration::seconds(1),
                Duration::seconds(10),
                0.0,
                JitterMode::None
            ),
            Err(DomainError::InvalidRetryMultiplier { .. })
        ));
    }

    #[test]
    fn default_policy_matches_documented_defaults() {
        let p = RetryPolicy::default_policy();
        match p {
            RetryPolicy::Exponential {
                max_attempts,
                base_delay,
                max_delay,
                multiplier,
                jitter,
            } => {
                assert_eq!(max_attempts, 6);
                assert_eq!(base_delay, Duration::seconds(2));
                assert_eq!(max_delay, Duration::seconds(60));
                assert_eq!(multiplier, 2.0);
                assert_eq!(jitter, JitterMode::Half);
            }
            _ => panic!("expected exponential default"),
        }
    }

    #[test]
    fn half_jitter_stays_within_half_to_full_range() {
        let p = RetryPolicy::exponential(
            2,
            Duration::seconds(10),
            Duration::seconds(100),
            1.0,
            JitterMode::Half,
        )
        .unwrap();
        for _ in 0..20 {
            let RetryDecision::Retry { delay } = p.decide(&err(), 1) else {
                panic!("expected retry")
            };
            assert!(delay >= Duration::seconds(5) && delay <= Duration::seconds(10));
        }
    }
}
