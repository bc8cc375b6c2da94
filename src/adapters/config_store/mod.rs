//! Source configuration persistence
//!
//! Per-user [`SourceConfig`]s survive restarts through a [`ConfigStore`].
//! Two backends ship with the crate:
//!
//! - [`MemoryConfigStore`] - process-local, for tests and embedding
//! - [`JsonFileConfigStore`] - one JSON document per user on disk, used by the CLI
//!
//! The first-party `self` source is never persisted; stores drop it on write
//! and ignore it on read.

pub mod file;
pub mod memory;

pub use file::JsonFileConfigStore;
pub use memory::MemoryConfigStore;

use crate::config::{StoreBackend, StoreConfig};
use crate::domain::{Platform, Result, SourceConfig, UserId};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Storage of per-user source configurations
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Persisted configurations of `user`, empty when none were saved
    ///
    /// # Errors
    ///
    /// Returns `ConfigStore` when the backend cannot be read.
    async fn load(&self, user: &UserId) -> Result<Vec<SourceConfig>>;

    /// Inserts or replaces the given configurations, keyed by platform
    ///
    /// Platforms not named in `configs` keep their stored configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigStore` when the backend cannot be written.
    async fn upsert(&self, user: &UserId, configs: &[SourceConfig]) -> Result<()>;
}

/// Creates the store selected by `[store]`
pub fn create_config_store(config: &StoreConfig) -> Arc<dyn ConfigStore> {
    match config.backend {
        StoreBackend::File => {
            tracing::debug!(path = %config.path, "Using JSON file configuration store");
            Arc::new(JsonFileConfigStore::new(&config.path))
        }
        StoreBackend::Memory => {
            tracing::debug!("Using in-memory configuration store");
            Arc::new(MemoryConfigStore::new())
        }
    }
}

/// Merges `updates` into `stored` by platform, dropping `self` and foreign users
pub(crate) fn merge_configs(
    stored: Vec<SourceConfig>,
    updates: &[SourceConfig],
    user: &UserId,
) -> Vec<SourceConfig> {
    let mut by_platform: BTreeMap<Platform, SourceConfig> = stored
        .into_iter()
        .filter(|c| persistable(c, user))
        .map(|c| (c.platform, c))
        .collect();
    for config in updates.iter().filter(|c| persistable(c, user)) {
        by_platform.insert(config.platform, config.clone());
    }
    by_platform.into_values().collect()
}

pub(crate) fn persistable(config: &SourceConfig, user: &UserId) -> bool {
    config.platform != Platform::SelfTracked && config.user_id == *user
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_replaces_by_platform_and_drops_self() {
        let user = UserId::new("u1").unwrap();
        let other = UserId::new("u2").unwrap();
        let stored = vec![
            SourceConfig::new(user.clone(), Platform::AppleHealth),
            SourceConfig::new(user.clone(), Platform::GoogleFit),
        ];
        let updates = vec![
            SourceConfig::self_tracked(user.clone()),
            SourceConfig::new(user.clone(), Platform::GoogleFit).enabled(),
            SourceConfig::new(other, Platform::Clinical).enabled(),
        ];

        let merged = merge_configs(stored, &updates, &user);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].platform, Platform::AppleHealth);
        assert!(!merged[0].enabled);
        assert_eq!(merged[1].platform, Platform::GoogleFit);
        assert!(merged[1].enabled);
    }
}
