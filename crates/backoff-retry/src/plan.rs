//! Retry parameters

use crate::error::{Result, RetryConfigError};
use std::time::Duration;

const DEFAULT_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_BACKOFF: f64 = 1.0;

/// How many extra attempts to make and how long to wait between them.
///
/// The first call is never counted: `attempts = 2` allows up to three calls.
/// Fields are public so a plan can be built without validation; use
/// [`RetryPlan::new`] or [`RetryPlan::validate`] to reject bad input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPlan {
    pub attempts: u32,
    pub delay: Duration,
    pub backoff: f64,
}

impl RetryPlan {
    /// Validated plan
    pub fn new(attempts: i64, delay: Duration, backoff: f64) -> Result<Self> {
        validate(attempts, delay.as_secs_f64(), backoff)?;
        Ok(Self {
            attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
            delay,
            backoff,
        })
    }

    /// `attempts` extra attempts, 1 second apart
    pub fn with_attempts(attempts: i64) -> Result<Self> {
        Self::new(attempts, DEFAULT_DELAY, DEFAULT_BACKOFF)
    }

    /// Validated plan from fractional values; `attempts` is floored
    pub fn from_secs_f64(attempts: f64, delay_secs: f64, backoff: f64) -> Result<Self> {
        let attempts = attempts.floor();
        if attempts.is_nan() {
            return Err(RetryConfigError::NegativeAttempts(-1));
        }
        validate(attempts as i64, delay_secs, backoff)?;
        let delay = Duration::try_from_secs_f64(delay_secs)
            .map_err(|_| RetryConfigError::NonPositiveDelay(delay_secs))?;
        Self::new(attempts as i64, delay, backoff)
    }

    pub fn validate(&self) -> Result<()> {
        validate(i64::from(self.attempts), self.delay.as_secs_f64(), self.backoff)
    }

    /// Delay to use after waiting `delay`
    pub fn next_delay(&self, delay: Duration) -> Duration {
        let secs = delay.as_secs_f64() * self.backoff;
        if secs.is_nan() || secs <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

/// Reject negative attempts, non-positive delay (seconds) or non-positive backoff
pub fn validate(attempts: i64, delay_secs: f64, backoff: f64) -> Result<()> {
    if attempts < 0 {
        return Err(RetryConfigError::NegativeAttempts(attempts));
    }

    if delay_secs.is_nan() || delay_secs <= 0.0 {
        return Err(RetryConfigError::NonPositiveDelay(delay_secs));
    }

    if backoff.is_nan() || backoff <= 0.0 {
        return Err(RetryConfigError::NonPositiveBackoff(backoff));
    }

    Ok(())
}
