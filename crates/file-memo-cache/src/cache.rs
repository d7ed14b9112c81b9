//! File-backed memoization of function results

use crate::codec::{Codec, JsonCodec};
use crate::error::{CacheError, Result};
use crate::paths::{self, absolute, resolve_under};
use crate::settings::CacheSettings;
use crate::types::{is_truthy, CacheLookup, CallArgs, FunctionId, Ttl};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::fs;
use tracing::{debug, info, warn};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A memo cache storing one file per (function, positional arguments)
pub struct MemoCache<C = JsonCodec> {
    settings: Arc<CacheSettings>,
    codec: C,
    /// Functions that have gone through the cache, in first-seen order
    seen: Mutex<Vec<FunctionId>>,
}

impl MemoCache<JsonCodec> {
    /// Create a cache storing JSON files
    pub fn new(settings: Arc<CacheSettings>) -> Self {
        Self::with_codec(settings, JsonCodec)
    }
}

impl<C: Codec> MemoCache<C> {
    pub fn with_codec(settings: Arc<CacheSettings>, codec: C) -> Self {
        info!(base_dir = ?settings.base_dir(), "Caching to directory");
        Self {
            settings,
            codec,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn settings(&self) -> &Arc<CacheSettings> {
        &self.settings
    }

    /// Directory holding every entry of `function`
    pub fn cache_dir(&self, function: &FunctionId) -> PathBuf {
        paths::function_dir(&self.settings.base_dir(), function)
    }

    /// Entry path for a call, creating the function directory if needed
    pub async fn cache_file(&self, function: &FunctionId, args: &CallArgs) -> PathBuf {
        let base_dir = self.settings.base_dir();
        let _ = mkdirs(&paths::function_dir(&base_dir, function), false).await;
        paths::entry_path(&base_dir, function, args)
    }

    /// Return the cached result of `f(args)` if fresh, otherwise compute and store it.
    ///
    /// A `force_reload_key` keyword in `args` overrides `force` and is removed
    /// before `f` sees the arguments. Cache failures never reach the caller;
    /// only errors from `f` itself do.
    pub async fn compute_or_fetch<T, E, F, Fut>(
        &self,
        function: &FunctionId,
        ttl: Ttl,
        force: bool,
        mut args: CallArgs,
        f: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(CallArgs) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        if self.settings.is_disabled() {
            return f(args).await;
        }

        self.record_seen(function);

        let force = match args.take_keyword(self.settings.force_reload_key()) {
            Some(value) => is_truthy(&value),
            None => force,
        };

        let path = paths::entry_path(&self.settings.base_dir(), function, &args);

        if force {
            debug!(function = %function, forced = true, "Cache miss");
        } else {
            match self.lookup::<T>(&path, ttl).await {
                CacheLookup::Hit(value) => {
                    debug!(function = %function, "Cache hit");
                    return Ok(value);
                }
                CacheLookup::Missing => {
                    debug!(function = %function, expired = false, forced = false, "Cache miss");
                }
                CacheLookup::Expired => {
                    debug!(function = %function, expired = true, forced = false, "Cache miss");
                }
                CacheLookup::Unreadable(e) => {
                    warn!(function = %function, path = ?path, error = %e, "Unreadable cache entry, recomputing");
                }
            }
        }

        let value = f(args).await?;

        if let Err(e) = self.store(&path, &value).await {
            warn!(function = %function, path = ?path, error = %e, "Failed to write cache entry");
        }

        Ok(value)
    }

    /// Read one entry without ever falling back to computation
    pub async fn lookup<T: DeserializeOwned>(&self, path: &Path, ttl: Ttl) -> CacheLookup<T> {
        let metadata = match fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return CacheLookup::Missing,
            Err(e) => return CacheLookup::Unreadable(e.into()),
        };

        let modified = match metadata.modified() {
            Ok(modified) => DateTime::<Utc>::from(modified),
            Err(e) => return CacheLookup::Unreadable(e.into()),
        };

        if is_stale(modified, Utc::now(), ttl) {
            return CacheLookup::Expired;
        }

        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return CacheLookup::Missing,
            Err(e) => return CacheLookup::Unreadable(e.into()),
        };

        match self.codec.decode(&bytes) {
            Ok(value) => CacheLookup::Hit(value),
            Err(e) => CacheLookup::Unreadable(e.into()),
        }
    }

    /// Serialize `value` and replace the file at `path` with it
    pub async fn store<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let bytes = self.codec.encode(value)?;

        let parent = path
            .parent()
            .ok_or_else(|| CacheError::Config(format!("no parent for {}", path.display())))?;
        mkdirs(parent, true).await?;

        // Write beside the target then rename so readers never see a partial file
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = parent.join(format!(
            ".{}.{}.{}.tmp",
            file_name,
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        fs::write(&temp, &bytes).await?;
        if let Err(e) = fs::rename(&temp, path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }

        debug!(path = ?path, size = bytes.len(), "Stored cache entry");
        Ok(())
    }

    /// Delete every entry of `function`
    pub async fn clear(&self, function: &FunctionId) -> Result<Vec<PathBuf>> {
        let base_dir = absolute(&self.settings.base_dir())?;
        let dir = paths::function_dir(&base_dir, function);

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&base_dir) {
                files.push(relative.to_path_buf());
            }
        }

        self.remove_files(&files).await
    }

    /// List or delete files under the base directory.
    ///
    /// With `dry_run` every file under the base directory is listed and nothing
    /// is deleted. Without it, `files` must be a non-empty list (normally the
    /// output of a dry run) and exactly those files are deleted. Returned
    /// paths are relative to the base directory.
    pub async fn clear_all(
        &self,
        files: Option<&[PathBuf]>,
        dry_run: bool,
    ) -> Result<Vec<PathBuf>> {
        if dry_run {
            return self.list_files().await;
        }

        let files = match files {
            Some(files) if !files.is_empty() => files,
            _ => return Err(CacheError::MissingConfirmation),
        };

        let base_dir = absolute(&self.settings.base_dir())?;
        let removed = self.remove_files(files).await?;

        Ok(removed
            .into_iter()
            .filter_map(|p| p.strip_prefix(&base_dir).ok().map(Path::to_path_buf))
            .collect())
    }

    /// Delete `files` (relative to the base directory) and return the absolute
    /// paths removed.
    ///
    /// Every path is validated before anything is deleted: one path resolving
    /// outside the base directory aborts the whole batch. Missing paths and
    /// directories are skipped.
    pub async fn remove_files(&self, files: &[PathBuf]) -> Result<Vec<PathBuf>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let base_dir = absolute(&self.settings.base_dir())?;

        let resolved = files
            .iter()
            .map(|file| resolve_under(&base_dir, file))
            .collect::<Result<Vec<_>>>()?;

        let canonical_base = match fs::canonicalize(&base_dir).await {
            Ok(path) => path,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut to_remove = Vec::new();
        for path in resolved {
            let metadata = match fs::symlink_metadata(&path).await {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if metadata.is_dir() {
                debug!(path = ?path, "Skipping directory");
                continue;
            }

            // Symlinked directories inside the root must not lead outside it
            if let Some(parent) = path.parent() {
                let real_parent = fs::canonicalize(parent).await?;
                if !real_parent.starts_with(&canonical_base) {
                    return Err(CacheError::ForbiddenPath(path));
                }
            }

            to_remove.push(path);
        }

        debug!(files = ?to_remove, "Removing from cache");

        let mut removed = Vec::with_capacity(to_remove.len());
        for path in to_remove {
            match fs::remove_file(&path).await {
                Ok(()) => removed.push(path),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        info!(count = removed.len(), files = ?removed, "Removed files from cache");
        Ok(removed)
    }

    /// Every file under the base directory, relative to it, sorted
    async fn list_files(&self) -> Result<Vec<PathBuf>> {
        let base_dir = absolute(&self.settings.base_dir())?;
        let mut files = Vec::new();
        let mut pending = vec![base_dir.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                } else if let Ok(relative) = path.strip_prefix(&base_dir) {
                    files.push(relative.to_path_buf());
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// Functions that have gone through the cache, in first-seen order
    pub fn seen(&self) -> Vec<FunctionId> {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn record_seen(&self, function: &FunctionId) {
        let mut seen = self
            .seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !seen.contains(function) {
            seen.push(function.clone());
        }
    }
}

impl<C: Codec> MemoCache<C> {
    /// Wrap `f` so every call goes through this cache
    pub fn memoize<F>(self: &Arc<Self>, function: FunctionId, ttl: Ttl, f: F) -> Memoized<C, F> {
        Memoized {
            cache: Arc::clone(self),
            function,
            ttl,
            f,
        }
    }

    /// [`MemoCache::memoize`] with the settings' default TTL
    pub fn memoize_default<F>(self: &Arc<Self>, function: FunctionId, f: F) -> Memoized<C, F> {
        let ttl = self.settings.default_ttl();
        self.memoize(function, ttl, f)
    }
}

/// A function bound to a cache, identity and TTL
pub struct Memoized<C, F> {
    cache: Arc<MemoCache<C>>,
    function: FunctionId,
    ttl: Ttl,
    f: F,
}

impl<C: Codec, F> Memoized<C, F> {
    pub async fn call<T, E, Fut>(&self, args: CallArgs) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(CallArgs) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.cache
            .compute_or_fetch(&self.function, self.ttl, false, args, &self.f)
            .await
    }

    pub fn function(&self) -> &FunctionId {
        &self.function
    }

    /// Delete every stored result of the wrapped function
    pub async fn clear(&self) -> Result<Vec<PathBuf>> {
        self.cache.clear(&self.function).await
    }
}

/// Whether an entry modified at `modified` is older than `ttl` at `now`.
///
/// Age is counted in whole seconds and must strictly exceed the TTL.
pub fn is_stale(modified: DateTime<Utc>, now: DateTime<Utc>, ttl: Ttl) -> bool {
    let since = (now - modified).num_seconds();
    since > ttl.as_secs()
}

/// Whether the file at `path` has outlived `ttl`; a missing file is never expired
pub async fn is_expired(path: &Path, ttl: Ttl) -> bool {
    let modified = match fs::metadata(path).await.and_then(|m| m.modified()) {
        Ok(modified) => DateTime::<Utc>::from(modified),
        Err(_) => return false,
    };
    is_stale(modified, Utc::now(), ttl)
}

/// Create `path` and its parents if missing.
///
/// Failures are logged and only returned when `raise_error` is set.
pub async fn mkdirs(path: &Path, raise_error: bool) -> Result<()> {
    match fs::create_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!(path = ?path, error = %e, "Unable to create cache directory");
            if raise_error {
                Err(e.into())
            } else {
                Ok(())
            }
        }
    }
}
