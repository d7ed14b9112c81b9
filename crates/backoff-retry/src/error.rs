//! Error types for retry configuration

use std::fmt;

/// A retry configuration rejected before any call is made
#[derive(Debug, Clone, PartialEq)]
pub enum RetryConfigError {
    NegativeAttempts(i64),
    /// Delay in seconds
    NonPositiveDelay(f64),
    NonPositiveBackoff(f64),
}

impl fmt::Display for RetryConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryConfigError::NegativeAttempts(n) => {
                write!(f, "attempts must be 0 or greater, got {}", n)
            }
            RetryConfigError::NonPositiveDelay(secs) => {
                write!(f, "delay must be greater than 0, got {}s", secs)
            }
            RetryConfigError::NonPositiveBackoff(backoff) => {
                write!(f, "backoff must be greater than 0, got {}", backoff)
            }
        }
    }
}

impl std::error::Error for RetryConfigError {}

pub type Result<T> = std::result::Result<T, RetryConfigError>;
