//! Retry with backoff
//!
//! Re-invokes an async function while it fails with an error the caller marks
//! as retriable, sleeping between attempts with a delay that grows by a fixed
//! factor, until it succeeds or the attempt budget runs out.

pub mod error;
pub mod plan;
pub mod runner;
pub mod settings;

pub use error::{Result, RetryConfigError};
pub use plan::{validate, RetryPlan};
pub use runner::{any_error, attempt, run, Attempt, Retry, Retrying};
pub use settings::RetrySettings;
