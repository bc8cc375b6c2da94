//! JSON file configuration store
//!
//! Each user's configurations live in `{dir}/{user_id}.json`. Writes go to a
//! sibling temporary file that is renamed over the document, so a crash never
//! leaves a half-written file behind.

use super::{merge_configs, persistable, ConfigStore};
use crate::domain::{MeridianError, Result, SourceConfig, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// On-disk document
#[derive(Debug, Serialize, Deserialize)]
struct StoredSources {
    user_id: UserId,
    #[serde(default)]
    sources: Vec<SourceConfig>,
}

/// [`ConfigStore`] keeping one JSON document per user
#[derive(Debug)]
pub struct JsonFileConfigStore {
    dir: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileConfigStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn document_path(&self, user: &UserId) -> PathBuf {
        self.dir.join(format!("{}.json", user.as_str()))
    }

    async fn read_document(&self, user: &UserId) -> Result<Vec<SourceConfig>> {
        let path = self.document_path(user);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(MeridianError::ConfigStore(format!(
                    "cannot read {}: {e}",
                    path.display()
                )))
            }
        };
        let document: StoredSources = serde_json::from_str(&contents).map_err(|e| {
            MeridianError::ConfigStore(format!("corrupt document {}: {e}", path.display()))
        })?;
        if document.user_id != *user {
            return Err(MeridianError::ConfigStore(format!(
                "{} belongs to {}, not {}",
                path.display(),
                document.user_id,
                user
            )));
        }
        Ok(document
            .sources
            .into_iter()
            .filter(|c| persistable(c, user))
            .collect())
    }
}

#[async_trait]
impl ConfigStore for JsonFileConfigStore {
    async fn load(&self, user: &UserId) -> Result<Vec<SourceConfig>> {
        self.read_document(user).await
    }

    async fn upsert(&self, user: &UserId, configs: &[SourceConfig]) -> Result<()> {
        let _write = self.write_lock.lock().await;

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            MeridianError::ConfigStore(format!("cannot create {}: {e}", self.dir.display()))
        })?;

        let stored = self.read_document(user).await?;
        let document = StoredSources {
            user_id: user.clone(),
            sources: merge_configs(stored, configs, user),
        };
        let json = serde_json::to_string_pretty(&document)?;

        let path = self.document_path(user);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(|e| {
            MeridianError::ConfigStore(format!("cannot write {}: {e}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            MeridianError::ConfigStore(format!("cannot replace {}: {e}", path.display()))
        })?;

        tracing::debug!(
            user_id = %user,
            sources = document.sources.len(),
            path = %path.display(),
            "Saved source configurations"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Platform;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_document_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileConfigStore::new(dir.path());
        let user = UserId::new("u1").unwrap();
        assert!(store.load(&user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_merges_and_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let user = UserId::new("u1").unwrap();
        let synced = Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap();

        let store = JsonFileConfigStore::new(dir.path().join("sources"));
        store
            .upsert(
                &user,
                &[SourceConfig::new(user.clone(), Platform::AppleHealth).enabled()],
            )
            .await
            .unwrap();
        store
            .upsert(
                &user,
                &[SourceConfig::new(user.clone(), Platform::GoogleFit)
                    .enabled()
                    .with_last_sync_date(synced)],
            )
            .await
            .unwrap();

        let reopened = JsonFileConfigStore::new(dir.path().join("sources"));
        let loaded = reopened.load(&user).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].platform, Platform::GoogleFit);
        assert_eq!(loaded[1].last_sync_date, Some(synced));
        assert!(!dir.path().join("sources/u1.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_document_is_store_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("u1.json"), "{ nope").unwrap();
        let store = JsonFileConfigStore::new(dir.path());
        let user = UserId::new("u1").unwrap();

        let err = store.load(&user).await.unwrap_err();
        assert!(matches!(err, MeridianError::ConfigStore(_)));
    }
}
