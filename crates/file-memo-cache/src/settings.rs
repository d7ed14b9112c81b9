//! Runtime-adjustable cache configuration

use crate::types::Ttl;
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// Keyword that forces recomputation when present in a call's keyword args
pub const DEFAULT_FORCE_RELOAD_KEY: &str = "cache_force";

const DEFAULT_DIR_NAME: &str = "file_memo_cache";

/// Settings shared by every cache built from them.
///
/// Usually wrapped in an `Arc` so the host can flip the switches while
/// calls are in flight.
#[derive(Debug)]
pub struct CacheSettings {
    base_dir: RwLock<PathBuf>,
    disabled: AtomicBool,
    force_reload_key: String,
    default_ttl: Ttl,
}

impl CacheSettings {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: RwLock::new(base_dir.into()),
            disabled: AtomicBool::new(false),
            force_reload_key: DEFAULT_FORCE_RELOAD_KEY.to_string(),
            default_ttl: Ttl::default(),
        }
    }

    /// Parse settings from `MEMO_CACHE_DIR`, `MEMO_CACHE_DISABLED` and
    /// `MEMO_CACHE_TTL_MINUTES`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`CacheSettings::from_env`] with a custom variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_dir = lookup("MEMO_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| env::temp_dir().join(DEFAULT_DIR_NAME));

        let disabled = lookup("MEMO_CACHE_DISABLED")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        let default_ttl = lookup("MEMO_CACHE_TTL_MINUTES")
            .and_then(|v| v.parse::<f64>().ok())
            .map(Ttl::from_minutes_f64)
            .unwrap_or_default();

        let settings = Self::new(base_dir).with_default_ttl(default_ttl);
        settings.set_disabled(disabled);
        settings
    }

    pub fn with_force_reload_key(mut self, key: impl Into<String>) -> Self {
        self.force_reload_key = key.into();
        self
    }

    pub fn with_default_ttl(mut self, ttl: Ttl) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn base_dir(&self) -> PathBuf {
        self.base_dir
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set_base_dir(&self, base_dir: impl Into<PathBuf>) {
        let mut guard = self
            .base_dir
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = base_dir.into();
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::Release);
    }

    pub fn force_reload_key(&self) -> &str {
        &self.force_reload_key
    }

    pub fn default_ttl(&self) -> Ttl {
        self.default_ttl
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self::new(env::temp_dir().join(DEFAULT_DIR_NAME))
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = CacheSettings::from_lookup(lookup_from(&[]));
        assert_eq!(settings.base_dir(), env::temp_dir().join("file_memo_cache"));
        assert!(!settings.is_disabled());
        assert_eq!(settings.force_reload_key(), "cache_force");
        assert_eq!(settings.default_ttl(), Ttl::minutes(5));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let settings = CacheSettings::from_lookup(lookup_from(&[
            ("MEMO_CACHE_DIR", "/var/cache/memo"),
            ("MEMO_CACHE_DISABLED", "TRUE"),
            ("MEMO_CACHE_TTL_MINUTES", "2.7"),
        ]));
        assert_eq!(settings.base_dir(), PathBuf::from("/var/cache/memo"));
        assert!(settings.is_disabled());
        assert_eq!(settings.default_ttl(), Ttl::minutes(2));
    }

    #[test]
    fn test_invalid_ttl_falls_back_to_default() {
        let settings =
            CacheSettings::from_lookup(lookup_from(&[("MEMO_CACHE_TTL_MINUTES", "soon")]));
        assert_eq!(settings.default_ttl(), Ttl::default());
    }

    #[test]
    fn test_switches_are_mutable_at_runtime() {
        let settings = CacheSettings::new("/a");
        settings.set_disabled(true);
        assert!(settings.is_disabled());
        settings.set_disabled(false);
        assert!(!settings.is_disabled());

        settings.set_base_dir("/b");
        assert_eq!(settings.base_dir(), PathBuf::from("/b"));
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag(" yes "));
        assert!(parse_flag("1"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }
}
