//! Mapping of function calls to paths under the cache root

use crate::error::{CacheError, Result};
use crate::types::{CallArgs, FunctionId};
use std::path::{Component, Path, PathBuf};

/// File name used for calls without positional arguments
pub const NO_ARGS_MARKER: &str = "None";

/// Encode one path segment so it can never contain a separator or be `.`/`..`
pub fn encode_segment(raw: &str) -> String {
    if raw.is_empty() {
        return "%00".to_string();
    }
    let encoded = urlencoding::encode(raw);
    if encoded.chars().all(|c| c == '.') {
        return encoded.replace('.', "%2E");
    }
    encoded.into_owned()
}

/// Directory holding every entry of one function
pub fn function_dir(base_dir: &Path, function: &FunctionId) -> PathBuf {
    base_dir
        .join(encode_segment(&function.namespace_segment()))
        .join(encode_segment(&function.name))
}

/// Entry path for a call; keyword arguments are ignored
pub fn entry_path(base_dir: &Path, function: &FunctionId, args: &CallArgs) -> PathBuf {
    let file_name = match args.signature() {
        Some(signature) => encode_segment(&signature),
        None => NO_ARGS_MARKER.to_string(),
    };
    function_dir(base_dir, function).join(file_name)
}

/// Resolve `.` and `..` without touching the filesystem
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Absolute, normalized form of `path`
pub fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(normalize(path))
    } else {
        Ok(normalize(&std::env::current_dir()?.join(path)))
    }
}

/// Join `candidate` onto `base` and require the result to stay strictly below it.
///
/// `base` must already be absolute and normalized.
pub fn resolve_under(base: &Path, candidate: &Path) -> Result<PathBuf> {
    let resolved = normalize(&base.join(candidate));
    if resolved == base || !resolved.starts_with(base) {
        return Err(CacheError::ForbiddenPath(resolved));
    }
    Ok(resolved)
}
