//! Retry loop

use crate::error::Result;
use crate::plan::RetryPlan;
use crate::settings::RetrySettings;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Classified outcome of a single call
#[derive(Debug, PartialEq)]
pub enum Attempt<T, E> {
    Success(T),
    /// Failed with an error the classifier accepts for retry
    Retriable(E),
    /// Failed with an error that must propagate immediately
    Fatal(E),
}

/// Classifier that retries every error
pub fn any_error<E>(_: &E) -> bool {
    true
}

/// Invoke `f` once and classify the result
pub async fn attempt<T, E, P, F, Fut>(is_retriable: &P, f: &mut F) -> Attempt<T, E>
where
    P: Fn(&E) -> bool,
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    match f().await {
        Ok(value) => Attempt::Success(value),
        Err(e) if is_retriable(&e) => Attempt::Retriable(e),
        Err(e) => Attempt::Fatal(e),
    }
}

/// Call `f` until it succeeds, fails with a non-retriable error, or the plan
/// runs out of attempts.
///
/// The first call is free; every retry consumes one attempt, sleeps for the
/// current delay and then multiplies the delay by the backoff factor. The
/// disabled switch in `settings` is checked before each retry. The plan is
/// not validated here. On exhaustion the last error is returned as-is.
pub async fn run<T, E, P, F, Fut>(
    plan: &RetryPlan,
    settings: &RetrySettings,
    is_retriable: P,
    mut f: F,
) -> std::result::Result<T, E>
where
    P: Fn(&E) -> bool,
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    let mut remaining = plan.attempts;
    let mut delay = plan.delay;

    loop {
        let err = match attempt(&is_retriable, &mut f).await {
            Attempt::Success(value) => return Ok(value),
            Attempt::Fatal(e) => return Err(e),
            Attempt::Retriable(e) => e,
        };

        if remaining == 0 {
            debug!(attempts = plan.attempts, "Retry attempts exhausted");
            return Err(err);
        }

        if settings.is_disabled() {
            debug!("Retry disabled, giving up after failed attempt");
            return Err(err);
        }

        remaining -= 1;
        warn!(
            "Retrying in {:?} (attempt {}/{})",
            delay,
            plan.attempts - remaining,
            plan.attempts
        );
        tokio::time::sleep(delay).await;
        delay = plan.next_delay(delay);
    }
}

/// A validated retry configuration bound to a classifier
pub struct Retry<P> {
    plan: RetryPlan,
    settings: Arc<RetrySettings>,
    is_retriable: P,
}

impl<P> Retry<P> {
    /// Validate `plan` up front so bad configuration fails before any call
    pub fn new(plan: RetryPlan, settings: Arc<RetrySettings>, is_retriable: P) -> Result<Self> {
        plan.validate()?;
        Ok(Self {
            plan,
            settings,
            is_retriable,
        })
    }

    pub fn plan(&self) -> &RetryPlan {
        &self.plan
    }

    /// Run `f` under this configuration
    pub async fn call<T, E, F, Fut>(&self, f: F) -> std::result::Result<T, E>
    where
        P: Fn(&E) -> bool,
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        run(&self.plan, &self.settings, &self.is_retriable, f).await
    }

    /// Bind `f` so that every call of the result is retried
    pub fn wrap<F>(self, f: F) -> Retrying<P, F> {
        Retrying { retry: self, f }
    }
}

/// A function wrapped with a retry configuration
pub struct Retrying<P, F> {
    retry: Retry<P>,
    f: F,
}

impl<P, F> Retrying<P, F> {
    /// Call the wrapped function with `args`, cloning them for each attempt
    pub async fn call<A, T, E, Fut>(&self, args: A) -> std::result::Result<T, E>
    where
        A: Clone,
        P: Fn(&E) -> bool,
        F: Fn(A) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.retry.call(|| (self.f)(args.clone())).await
    }
}
