//! clear-cache subcommand
//!
//! Explicit eviction of the persisted endpoint-state cache. The endpoint list
//! itself is not touched.

use clap::Args;
use std::process::ExitCode;

use crate::config::MonitorConfig;
use crate::lock::current_holder;
use crate::store::EndpointStore;

/// Arguments for the clear-cache subcommand
#[derive(Args, Debug, Clone, Default)]
pub struct ClearCacheArgs {}

/// Execute the clear-cache command
pub fn execute(_args: &ClearCacheArgs, config: &MonitorConfig) -> anyhow::Result<ExitCode> {
    if let Some(info) = current_holder(&config.data_dir) {
        anyhow::bail!(
            "monitor is running (PID: {}); its in-memory cache would be written back. Stop it first.",
            info.pid
        );
    }
    let store = EndpointStore::new(&config.data_dir);
    if store.remove_state_cache()? {
        println!("Removed {}", store.cache_path().display());
    } else {
        println!("No endpoint cache at {}", store.cache_path().display());
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EndpointStateCache;

    #[test]
    fn test_clear_cache_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = MonitorConfig {
            data_dir: dir.path().to_path_buf(),
            ..MonitorConfig::default()
        };
        let store = EndpointStore::new(dir.path());
        let cache = EndpointStateCache::new();
        cache.update("u", |s| s.etag = Some("e".to_string()));
        store.save_state_cache(&cache.snapshot()).unwrap();

        execute(&ClearCacheArgs {}, &config).unwrap();
        assert!(!store.cache_path().exists());
        // Idempotent
        execute(&ClearCacheArgs {}, &config).unwrap();
    }
}
