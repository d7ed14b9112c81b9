//! File-backed memoization with TTL expiration
//!
//! Stores the serialized result of a function call at
//! `<base_dir>/<namespace>/<function>/<positional args>` and serves it back
//! until the file's modification time is older than the call's TTL.
//! Bulk deletion is confined to the base directory.

mod cache;
pub mod codec;
pub mod error;
pub mod paths;
mod settings;
mod types;

pub use cache::{is_expired, is_stale, mkdirs, Memoized, MemoCache};
pub use codec::{Codec, JsonCodec, YamlCodec};
pub use error::{CacheError, CodecError, Result};
pub use settings::{CacheSettings, DEFAULT_FORCE_RELOAD_KEY};
pub use types::{CacheLookup, CallArgs, FunctionId, Ttl};

pub use serde_json::Value;
