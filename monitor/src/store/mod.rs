//! Endpoint configuration persistence.
//!
//! Manages `api_config.json` (the authoritative endpoint list) and
//! `endpoint_cache.json` (advisory probe/fetch history) in the data directory.
//! Every write goes to a fresh temporary file next to the target which is
//! flushed, closed and then renamed over it, so readers see either the old or
//! the new document and never a partial one.

pub mod state_cache;

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::common::StoreError;
use crate::types::EndpointConfig;
pub use state_cache::{EndpointStateCache, StateCacheFile};

/// File name of the endpoint configuration.
pub const CONFIG_FILE_NAME: &str = "api_config.json";
/// File name of the endpoint-state cache.
pub const CACHE_FILE_NAME: &str = "endpoint_cache.json";

/// Lock-serialized, crash-safe store for the endpoint config and state cache.
#[derive(Debug)]
pub struct EndpointStore {
    config_path: PathBuf,
    cache_path: PathBuf,
    lock: Mutex<()>,
}

impl EndpointStore {
    /// Create a store writing `api_config.json` / `endpoint_cache.json` in `data_dir`.
    pub fn new(data_dir: &Path) -> Self {
        Self::with_paths(
            data_dir.join(CONFIG_FILE_NAME),
            data_dir.join(CACHE_FILE_NAME),
        )
    }

    /// Create a store with explicit file locations.
    pub fn with_paths(config_path: PathBuf, cache_path: PathBuf) -> Self {
        Self {
            config_path,
            cache_path,
            lock: Mutex::new(()),
        }
    }

    /// Location of the endpoint configuration.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Location of the endpoint-state cache.
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Load the endpoint configuration. A missing, empty or unparsable file
    /// yields the default config; this never fails.
    pub fn load(&self) -> EndpointConfig {
        let _guard = self.guard();
        match read_json::<EndpointConfig>(&self.config_path) {
            Ok(Some(mut config)) => {
                config.dedup_endpoints();
                config
            }
            Ok(None) => EndpointConfig::default(),
            Err(e) => {
                warn!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to load endpoint config, using defaults"
                );
                EndpointConfig::default()
            }
        }
    }

    /// Atomically persist the endpoint configuration.
    pub fn save(&self, config: &EndpointConfig) -> Result<(), StoreError> {
        let _guard = self.try_guard()?;
        let bytes = serde_json::to_vec_pretty(config)?;
        write_atomic(&self.config_path, &bytes)?;
        info!(
            path = %self.config_path.display(),
            endpoints = config.endpoints.len(),
            "Endpoint config saved"
        );
        Ok(())
    }

    /// Load the endpoint-state cache; losing it only costs re-probing, so any
    /// problem yields an empty cache.
    pub fn load_state_cache(&self) -> StateCacheFile {
        let _guard = self.guard();
        match read_json::<StateCacheFile>(&self.cache_path) {
            Ok(file) => file.unwrap_or_default(),
            Err(e) => {
                warn!(
                    path = %self.cache_path.display(),
                    error = %e,
                    "Failed to load endpoint cache, starting empty"
                );
                StateCacheFile::default()
            }
        }
    }

    /// Atomically persist the endpoint-state cache.
    pub fn save_state_cache(&self, file: &StateCacheFile) -> Result<(), StoreError> {
        let _guard = self.try_guard()?;
        let bytes = serde_json::to_vec_pretty(file)?;
        write_atomic(&self.cache_path, &bytes)?;
        debug!(
            path = %self.cache_path.display(),
            endpoints = file.endpoint_cache.len(),
            "Endpoint cache saved"
        );
        Ok(())
    }

    /// Delete the persisted endpoint-state cache.
    pub fn remove_state_cache(&self) -> Result<bool, StoreError> {
        let _guard = self.try_guard()?;
        match fs::remove_file(&self.cache_path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // The guarded value is (); a poisoned lock carries no broken invariant for readers.
        self.lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn try_guard(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.lock.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if content.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&content)?))
}

/// Write `bytes` to `path` via a temporary file in the same directory.
///
/// On any failure the temporary file is removed and `path` is untouched.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;

    // Close the handle before the rename; TempPath still deletes on drop.
    let tmp_path = tmp.into_temp_path();
    tmp_path.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}
