use std::env;
use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide retry switches, shared via `Arc`
#[derive(Debug, Default)]
pub struct RetrySettings {
    disabled: AtomicBool,
}

impl RetrySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse settings from `RETRY_DISABLED`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let disabled = lookup("RETRY_DISABLED")
            .map(|v| {
                matches!(
                    v.trim().to_ascii_lowercase().as_str(),
                    "1" | "true" | "yes" | "on"
                )
            })
            .unwrap_or(false);

        let settings = Self::new();
        settings.set_disabled(disabled);
        settings
    }

    /// When set, failing calls are not retried; checked between attempts
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::Release);
    }
}
