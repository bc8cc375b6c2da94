//! Per-user source registry
//!
//! Holds `{platform -> SourceConfig}` for every user the coordinator has seen.
//! Each user's map sits behind its own `tokio::sync::RwLock`: registry writes
//! for one user are serialized, imports take the read side, and different
//! users never contend.

use crate::domain::{Platform, SourceConfig, SourceSettings, UserId};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

/// Source configurations of one user
///
/// `self` is always present and enabled.
#[derive(Debug, Clone)]
pub struct UserSources {
    user: UserId,
    sources: BTreeMap<Platform, SourceConfig>,
}

impl UserSources {
    pub fn new(user: UserId) -> Self {
        let mut sources = BTreeMap::new();
        sources.insert(
            Platform::SelfTracked,
            SourceConfig::self_tracked(user.clone()),
        );
        Self { user, sources }
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    /// Back to `{self: enabled}`
    pub fn reset(&mut self) {
        *self = Self::new(self.user.clone());
    }

    /// Adds configurations loaded from the store
    ///
    /// `self` entries and entries owned by another user are ignored.
    pub fn merge_persisted(&mut self, configs: Vec<SourceConfig>) {
        for config in configs {
            if config.platform == Platform::SelfTracked || config.user_id != self.user {
                tracing::debug!(
                    user_id = %self.user,
                    platform = %config.platform,
                    "Ignoring persisted source configuration"
                );
                continue;
            }
            self.sources.insert(config.platform, config);
        }
    }

    fn entry(&mut self, platform: Platform) -> &mut SourceConfig {
        let user = self.user.clone();
        self.sources
            .entry(platform)
            .or_insert_with(|| SourceConfig::new(user, platform))
    }

    /// Marks a platform enabled; `settings`, when given, replace the stored ones
    pub fn mark_enabled(&mut self, platform: Platform, settings: Option<SourceSettings>) {
        let config = self.entry(platform);
        config.enabled = true;
        if let Some(settings) = settings {
            config.settings = settings;
        }
    }

    /// Marks a platform disabled, keeping its history and settings
    pub fn mark_disabled(&mut self, platform: Platform) {
        if platform == Platform::SelfTracked {
            return;
        }
        if let Some(config) = self.sources.get_mut(&platform) {
            config.enabled = false;
        }
    }

    pub fn record_sync(&mut self, platform: Platform, at: DateTime<Utc>) {
        self.entry(platform).last_sync_date = Some(at);
    }

    pub fn is_enabled(&self, platform: Platform) -> bool {
        platform == Platform::SelfTracked
            || self
                .sources
                .get(&platform)
                .map(|c| c.enabled)
                .unwrap_or(false)
    }

    pub fn get(&self, platform: Platform) -> Option<&SourceConfig> {
        self.sources.get(&platform)
    }

    /// Every configuration, `self` first
    pub fn snapshot(&self) -> Vec<SourceConfig> {
        self.sources.values().cloned().collect()
    }

    /// Configurations that belong in the store (everything but `self`)
    pub fn persistable(&self) -> Vec<SourceConfig> {
        self.sources
            .values()
            .filter(|c| c.platform != Platform::SelfTracked)
            .cloned()
            .collect()
    }
}

/// Registry of every user's sources
#[derive(Debug, Default)]
pub struct SourceRegistry {
    users: RwLock<HashMap<UserId, Arc<tokio::sync::RwLock<UserSources>>>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock handle of `user`'s sources, created as `{self: enabled}` on first use
    pub fn user(&self, user: &UserId) -> Arc<tokio::sync::RwLock<UserSources>> {
        if let Some(sources) = self
            .users
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(user)
        {
            return sources.clone();
        }
        self.users
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(user.clone())
            .or_insert_with(|| Arc::new(tokio::sync::RwLock::new(UserSources::new(user.clone()))))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserId {
        UserId::new("u1").unwrap()
    }

    #[test]
    fn test_new_user_has_only_self() {
        let sources = UserSources::new(user());
        let snapshot = sources.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].platform, Platform::SelfTracked);
        assert!(snapshot[0].enabled);
        assert!(sources.persistable().is_empty());
    }

    #[test]
    fn test_disable_keeps_history_and_settings() {
        let mut sources = UserSources::new(user());
        let mut settings = SourceSettings::new();
        settings.insert("patient_id".to_string(), "p-1".to_string());
        let synced = Utc::now();

        sources.mark_enabled(Platform::Clinical, Some(settings.clone()));
        sources.record_sync(Platform::Clinical, synced);
        sources.mark_disabled(Platform::Clinical);

        let clinical = sources.get(Platform::Clinical).unwrap();
        assert!(!clinical.enabled);
        assert_eq!(clinical.last_sync_date, Some(synced));
        assert_eq!(clinical.settings, settings);
        assert!(!sources.is_enabled(Platform::Clinical));
    }

    #[test]
    fn test_self_cannot_be_disabled_or_overwritten() {
        let mut sources = UserSources::new(user());
        sources.mark_disabled(Platform::SelfTracked);
        sources.merge_persisted(vec![SourceConfig::new(user(), Platform::SelfTracked)]);
        assert!(sources.is_enabled(Platform::SelfTracked));
    }

    #[test]
    fn test_reset_forgets_external_sources() {
        let mut sources = UserSources::new(user());
        sources.mark_enabled(Platform::GoogleFit, None);
        sources.reset();
        assert!(!sources.is_enabled(Platform::GoogleFit));
        assert_eq!(sources.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_registry_returns_same_handle() {
        let registry = SourceRegistry::new();
        let a = registry.user(&user());
        a.write().await.mark_enabled(Platform::AppleHealth, None);
        let b = registry.user(&user());
        assert!(b.read().await.is_enabled(Platform::AppleHealth));
    }
}
