//! In-memory configuration store

use super::{merge_configs, persistable, ConfigStore};
use crate::domain::{Result, SourceConfig, UserId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Process-local [`ConfigStore`]
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    users: Mutex<HashMap<UserId, Vec<SourceConfig>>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with configurations, grouped by their owner
    pub fn with_configs(configs: impl IntoIterator<Item = SourceConfig>) -> Self {
        let mut users: HashMap<UserId, Vec<SourceConfig>> = HashMap::new();
        for config in configs {
            users.entry(config.user_id.clone()).or_default().push(config);
        }
        Self {
            users: Mutex::new(users),
        }
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load(&self, user: &UserId) -> Result<Vec<SourceConfig>> {
        let users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        Ok(users
            .get(user)
            .map(|configs| {
                configs
                    .iter()
                    .filter(|c| persistable(c, user))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn upsert(&self, user: &UserId, configs: &[SourceConfig]) -> Result<()> {
        let mut users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        let stored = users.remove(user).unwrap_or_default();
        users.insert(user.clone(), merge_configs(stored, configs, user));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Platform;

    #[tokio::test]
    async fn test_upsert_then_load() {
        let store = MemoryConfigStore::new();
        let user = UserId::new("u1").unwrap();

        store
            .upsert(
                &user,
                &[
                    SourceConfig::self_tracked(user.clone()),
                    SourceConfig::new(user.clone(), Platform::GoogleFit).enabled(),
                ],
            )
            .await
            .unwrap();

        let loaded = store.load(&user).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].platform, Platform::GoogleFit);

        let nobody = UserId::new("u2").unwrap();
        assert!(store.load(&nobody).await.unwrap().is_empty());
    }
}
