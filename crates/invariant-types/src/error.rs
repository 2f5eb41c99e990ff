use thiserror;

#[derive(Clone, Debug, thiserror::Error)]
pub enum DomainError {
    #[error("max call depth of {max} exceeded")]
    MaxCallDepthExceeded { max: usize },
    #[error("retry policy requires max_attempts >= 1, got {max_attempts}")]
    InvalidRetryMaxAttempts { max_attempts: u32 },
    #[error("retry policy requires non-negative delays, got base={base_secs}s max={max_secs}s")]
    InvalidRetryDelay { base_secs: i64, max_secs: i64 },
    #[error("retry policy requires multiplier > 0, got {multiplier}")]
    InvalidRetryMultiplier { multiplier: f64 },
    #[error("wait duration must be at least 1 second, got {millis}ms")]
    SubSecondWait { millis: i64 },
}
