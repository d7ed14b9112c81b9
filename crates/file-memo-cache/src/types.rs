//! Cache types

use crate::error::CacheError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

const DEFAULT_TTL_MINUTES: u64 = 5;

/// Identity of a memoized function: the module it lives in plus its name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId {
    pub namespace: String,
    pub name: String,
}

impl FunctionId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Namespace as a single directory name (`a::b` becomes `a.b`)
    pub fn namespace_segment(&self) -> String {
        self.namespace.replace("::", ".")
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.namespace, self.name)
    }
}

/// Build a [`FunctionId`] for a function defined in the calling module
#[macro_export]
macro_rules! function_id {
    ($name:ident) => {
        $crate::FunctionId::new(module_path!(), stringify!($name))
    };
}

/// Arguments of one call: positional values rendered as strings and
/// keyword values as JSON
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub positional: Vec<String>,
    pub keyword: BTreeMap<String, Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument
    pub fn arg(mut self, value: impl fmt::Display) -> Self {
        self.positional.push(value.to_string());
        self
    }

    /// Set a keyword argument
    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.insert(key.into(), value.into());
        self
    }

    /// Remove and return a keyword argument
    pub fn take_keyword(&mut self, key: &str) -> Option<Value> {
        self.keyword.remove(key)
    }

    /// Positional arguments joined with `-`, or `None` when there are none
    pub fn signature(&self) -> Option<String> {
        if self.positional.is_empty() {
            None
        } else {
            Some(self.positional.join("-"))
        }
    }

    /// Keyword arguments in key order as `k=v` pairs joined with `,`.
    /// Not part of the cache key.
    pub fn keyword_signature(&self) -> Option<String> {
        if self.keyword.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self
            .keyword
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        Some(pairs.join(","))
    }
}

/// Lifetime of a cache entry in whole minutes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ttl {
    minutes: u64,
}

impl Ttl {
    pub const fn minutes(minutes: u64) -> Self {
        Self { minutes }
    }

    /// Truncate fractional minutes; negative or NaN input becomes zero
    pub fn from_minutes_f64(minutes: f64) -> Self {
        if minutes.is_nan() || minutes <= 0.0 {
            return Self::minutes(0);
        }
        Self::minutes(minutes.floor() as u64)
    }

    pub fn as_minutes(&self) -> u64 {
        self.minutes
    }

    pub fn as_secs(&self) -> i64 {
        i64::try_from(self.minutes.saturating_mul(60)).unwrap_or(i64::MAX)
    }
}

impl Default for Ttl {
    fn default() -> Self {
        Self::minutes(DEFAULT_TTL_MINUTES)
    }
}

/// Outcome of reading one cache entry
#[derive(Debug)]
pub enum CacheLookup<T> {
    Hit(T),
    /// No file at the entry path
    Missing,
    /// File exists but is older than the TTL
    Expired,
    /// File exists and is fresh but could not be read or decoded
    Unreadable(CacheError),
}

impl<T> CacheLookup<T> {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }

    pub fn into_hit(self) -> Option<T> {
        match self {
            CacheLookup::Hit(value) => Some(value),
            _ => None,
        }
    }
}

/// Python-style truthiness for keyword values such as the force flag
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
