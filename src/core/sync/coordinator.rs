//! Sync coordinator - orchestrates imports, exports and source configuration
//!
//! The coordinator owns the source registry, the configuration store and one
//! adapter per external platform. Adapters are injected once at construction
//! and shared as `Arc`s.

use super::summary::{ExportResult, ImportResult, PermissionReport, SyncError, SyncErrorType};
use crate::adapters::apple_health::{AppleHealthAdapter, HealthKitExportFile};
use crate::adapters::clinical::ClinicalAdapter;
use crate::adapters::config_store::{create_config_store, ConfigStore};
use crate::adapters::google_fit::{FitExportFile, GoogleFitAdapter};
use crate::adapters::platform::PlatformAdapter;
use crate::config::{MeridianConfig, SyncConfig};
use crate::core::registry::SourceRegistry;
use crate::core::transform::{from_canonical, to_canonical, ConversionBatch};
use crate::domain::{
    HealthRecord, MeridianError, MetricKind, Observation, Platform, Result, SourceConfig,
    SourceSettings, TimeRange, UserId,
};
use crate::log_import_start;
use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinError;

/// Orchestrator over the registry, the store and the platform adapters
pub struct SyncCoordinator {
    store: Arc<dyn ConfigStore>,
    registry: SourceRegistry,
    adapters: BTreeMap<Platform, Arc<dyn PlatformAdapter>>,
    max_concurrent: usize,
    persist_after_import: bool,
}

impl SyncCoordinator {
    pub fn new(store: Arc<dyn ConfigStore>, config: &SyncConfig) -> Self {
        Self {
            store,
            registry: SourceRegistry::new(),
            adapters: BTreeMap::new(),
            max_concurrent: config.max_concurrent_queries.max(1),
            persist_after_import: config.persist_after_import,
        }
    }

    /// Builds the coordinator with every adapter the configuration describes
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when the clinical gateway cannot be set up.
    pub fn from_config(config: &MeridianConfig) -> Result<Self> {
        let timeout = config.sync.timeout();
        let mut coordinator = Self::new(create_config_store(&config.store), &config.sync);

        if let Some(path) = &config.apple_health.export_path {
            let bridge = Arc::new(HealthKitExportFile::new(path));
            coordinator = coordinator
                .with_adapter(Arc::new(AppleHealthAdapter::new(bridge).with_timeout(timeout)));
        }
        if let Some(path) = &config.google_fit.export_path {
            let bridge = Arc::new(FitExportFile::new(path));
            coordinator = coordinator
                .with_adapter(Arc::new(GoogleFitAdapter::new(bridge).with_timeout(timeout)));
        }
        if let Some(clinical) = &config.clinical {
            coordinator =
                coordinator.with_adapter(Arc::new(ClinicalAdapter::from_config(clinical, timeout)?));
        }

        tracing::debug!(
            platforms = ?coordinator.adapters.keys().collect::<Vec<_>>(),
            "Sync coordinator ready"
        );
        Ok(coordinator)
    }

    /// Registers the adapter of its platform, replacing any previous one
    pub fn with_adapter(mut self, adapter: Arc<dyn PlatformAdapter>) -> Self {
        self.adapters.insert(adapter.platform(), adapter);
        self
    }

    pub fn adapter(&self, platform: Platform) -> Option<&Arc<dyn PlatformAdapter>> {
        self.adapters.get(&platform)
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    fn require_adapter(&self, platform: Platform) -> Result<Arc<dyn PlatformAdapter>> {
        self.adapters.get(&platform).cloned().ok_or_else(|| {
            MeridianError::Availability(format!("no adapter configured for {platform}"))
        })
    }

    /// Rebuilds the user's registry from the store
    ///
    /// The registry becomes `{self: enabled}` plus every persisted source. When
    /// the clinical source is enabled its settings are pushed to the clinical
    /// adapter.
    ///
    /// # Errors
    ///
    /// Store failures propagate unchanged and leave the registry as it was.
    pub async fn configure(&self, user: &UserId) -> Result<()> {
        let persisted = self.store.load(user).await?;

        let handle = self.registry.user(user);
        let clinical_settings = {
            let mut sources = handle.write().await;
            sources.reset();
            sources.merge_persisted(persisted);
            sources
                .get(Platform::Clinical)
                .filter(|c| c.enabled)
                .map(|c| c.settings.clone())
        };

        if let (Some(settings), Some(adapter)) =
            (clinical_settings, self.adapters.get(&Platform::Clinical))
        {
            adapter.apply_settings(user, &settings).await?;
        }

        tracing::info!(user_id = %user, "Configured data sources");
        Ok(())
    }

    /// Enables a platform after probing it
    ///
    /// Returns `false` and leaves the registry untouched when the platform is
    /// not available.
    pub async fn enable_data_source(
        &self,
        user: &UserId,
        platform: Platform,
        settings: Option<SourceSettings>,
    ) -> Result<bool> {
        if platform == Platform::SelfTracked {
            return Ok(true);
        }
        let Some(adapter) = self.adapters.get(&platform) else {
            tracing::warn!(platform = %platform, "No adapter configured, cannot enable");
            return Ok(false);
        };
        if !adapter.is_available().await {
            tracing::warn!(platform = %platform, "Platform unavailable, not enabling");
            return Ok(false);
        }

        if let Some(settings) = &settings {
            adapter.apply_settings(user, settings).await?;
        }
        self.registry
            .user(user)
            .write()
            .await
            .mark_enabled(platform, settings);

        tracing::info!(user_id = %user, platform = %platform, "Enabled data source");
        Ok(true)
    }

    /// Disables a platform, keeping its history and settings
    ///
    /// # Errors
    ///
    /// `self` cannot be disabled (`UnsupportedOperation`).
    pub async fn disable_data_source(&self, user: &UserId, platform: Platform) -> Result<()> {
        if platform == Platform::SelfTracked {
            return Err(MeridianError::UnsupportedOperation {
                platform,
                operation: "disable".to_string(),
            });
        }
        self.registry
            .user(user)
            .write()
            .await
            .mark_disabled(platform);
        tracing::info!(user_id = %user, platform = %platform, "Disabled data source");
        Ok(())
    }

    /// Upserts every non-`self` configuration of the user
    pub async fn save_data_source_configs(&self, user: &UserId) -> Result<()> {
        let configs = self.registry.user(user).read().await.persistable();
        self.store.upsert(user, &configs).await
    }

    /// Current configurations of the user, `self` first
    pub async fn data_sources(&self, user: &UserId) -> Vec<SourceConfig> {
        self.registry.user(user).read().await.snapshot()
    }

    /// Probes every adapter concurrently; `self` is always available
    pub async fn get_available_data_sources(&self) -> Vec<Platform> {
        let probes = self.adapters.iter().map(|(platform, adapter)| async move {
            (*platform, adapter.is_available().await)
        });
        let mut available = vec![Platform::SelfTracked];
        available.extend(
            futures::future::join_all(probes)
                .await
                .into_iter()
                .filter_map(|(platform, up)| up.then_some(platform)),
        );
        available
    }

    /// Requests read access per kind
    ///
    /// Kinds the platform cannot represent fail individually with
    /// `UnsupportedMetric`; the rest are requested in a single bridge call.
    pub async fn request_permissions(
        &self,
        platform: Platform,
        kinds: &[MetricKind],
    ) -> Result<PermissionReport> {
        let mut report = PermissionReport::new(platform);
        if platform == Platform::SelfTracked {
            report.granted = kinds.to_vec();
            return Ok(report);
        }
        let adapter = self.require_adapter(platform)?;

        let mut mapped = Vec::new();
        for kind in kinds {
            if adapter.native_type(*kind).is_some() {
                mapped.push(*kind);
            } else {
                report.errors.push(SyncError::for_kind(
                    &MeridianError::unmapped_metric(*kind, platform),
                    platform,
                    *kind,
                ));
            }
        }
        if mapped.is_empty() {
            return Ok(report);
        }

        match adapter.request_permissions(&mapped).await {
            Ok(true) => report.granted = mapped,
            Ok(false) => {
                for kind in mapped {
                    report.errors.push(SyncError::for_kind(
                        &MeridianError::PermissionDenied(format!(
                            "{} access to {kind} was not granted",
                            platform.display_name()
                        )),
                        platform,
                        kind,
                    ));
                }
            }
            Err(e) => {
                tracing::warn!(platform = %platform, error = %e, "Permission request failed");
                for kind in mapped {
                    report.errors.push(SyncError::for_kind(&e, platform, kind));
                }
            }
        }
        Ok(report)
    }

    /// Imports the given kinds from an enabled platform
    ///
    /// Per-kind queries run concurrently up to `sync.max_concurrent_queries`.
    /// A failed kind is recorded and the rest continue. Observations equal in
    /// content collapse into one and come back ordered by effective time.
    /// When `cancel` flips to `true` no further queries start, finished
    /// results are kept and queries still in flight are detached.
    ///
    /// # Errors
    ///
    /// `PlatformDisabled` when the platform is not enabled for the user,
    /// `UnsupportedOperation` for `self`, `Availability` when no adapter is
    /// configured.
    pub async fn import_data(
        &self,
        platform: Platform,
        kinds: &[MetricKind],
        user: &UserId,
        range: TimeRange,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<ImportResult> {
        let started = Instant::now();
        if platform == Platform::SelfTracked {
            return Err(MeridianError::UnsupportedOperation {
                platform,
                operation: "import".to_string(),
            });
        }
        let adapter = self.require_adapter(platform)?;

        let handle = self.registry.user(user);
        let sources = handle.read().await;
        if !sources.is_enabled(platform) {
            return Err(MeridianError::PlatformDisabled(platform));
        }

        let mut pending: VecDeque<MetricKind> = VecDeque::new();
        for kind in kinds {
            if !pending.contains(kind) {
                pending.push_back(*kind);
            }
        }
        log_import_start!(platform, user, pending.len());

        let mut result = ImportResult::new(platform);
        let mut merged: BTreeMap<(DateTime<Utc>, String), Observation> = BTreeMap::new();
        let mut in_flight = FuturesUnordered::new();
        let mut cancel_open = true;
        let mut cancelled = *cancel.borrow();

        loop {
            while !cancelled && in_flight.len() < self.max_concurrent {
                let Some(kind) = pending.pop_front() else {
                    break;
                };
                let adapter = adapter.clone();
                let user = user.clone();
                let task =
                    tokio::spawn(async move { adapter.import_metric(kind, range, &user).await });
                in_flight.push(async move { (kind, task.await) });
            }
            if cancelled || in_flight.is_empty() {
                break;
            }

            tokio::select! {
                changed = cancel.changed(), if cancel_open => {
                    match changed {
                        Ok(()) => cancelled = *cancel.borrow(),
                        // Sender gone: nobody can cancel any more
                        Err(_) => cancel_open = false,
                    }
                }
                Some((kind, joined)) = in_flight.next() => {
                    self.absorb(platform, kind, joined, &mut merged, &mut result.errors);
                }
                else => break,
            }
        }

        if cancelled {
            tracing::warn!(
                platform = %platform,
                detached = in_flight.len(),
                not_started = pending.len(),
                "Import cancelled"
            );
            result.cancelled = true;
        }
        // Dropping the join handles detaches whatever is still running
        drop(in_flight);
        drop(sources);

        result.observations = merged.into_values().collect();
        let ConversionBatch {
            converted,
            failures,
        } = from_canonical(&result.observations, Some(platform));
        for failure in &failures {
            let metric = result
                .observations
                .get(failure.index)
                .and_then(|o| o.metric_kind().ok())
                .map(|k| k.to_string());
            result
                .errors
                .push(SyncError::for_item(failure, platform, metric));
        }
        result.records = converted;

        self.record_sync(user, platform, &mut result).await;

        result.duration = started.elapsed();
        result.log_summary();
        Ok(result)
    }

    /// Folds one finished per-kind query into the import
    fn absorb(
        &self,
        platform: Platform,
        kind: MetricKind,
        joined: std::result::Result<Result<ConversionBatch<Observation>>, JoinError>,
        merged: &mut BTreeMap<(DateTime<Utc>, String), Observation>,
        errors: &mut Vec<SyncError>,
    ) {
        match joined {
            Ok(Ok(batch)) => {
                tracing::debug!(
                    platform = %platform,
                    kind = %kind,
                    converted = batch.converted.len(),
                    failed = batch.failures.len(),
                    "Kind imported"
                );
                for failure in &batch.failures {
                    errors.push(SyncError::for_item(
                        failure,
                        platform,
                        Some(kind.to_string()),
                    ));
                }
                for observation in batch.converted {
                    let key = (observation.effective_date_time(), observation.fingerprint());
                    merged.entry(key).or_insert(observation);
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(platform = %platform, kind = %kind, error = %e, "Kind import failed");
                errors.push(SyncError::for_kind(&e, platform, kind));
            }
            Err(e) => {
                tracing::error!(platform = %platform, kind = %kind, error = %e, "Import task failed");
                errors.push(SyncError {
                    error_type: SyncErrorType::Internal,
                    platform,
                    metric: Some(kind.to_string()),
                    message: format!("import task failed: {e}"),
                    retryable: false,
                });
            }
        }
    }

    /// Stamps `last_sync_date` and, if configured, persists it
    async fn record_sync(&self, user: &UserId, platform: Platform, result: &mut ImportResult) {
        let configs = {
            let handle = self.registry.user(user);
            let mut sources = handle.write().await;
            sources.record_sync(platform, Utc::now());
            sources.persistable()
        };
        if !self.persist_after_import {
            return;
        }
        if let Err(e) = self.store.upsert(user, &configs).await {
            tracing::warn!(
                user_id = %user,
                platform = %platform,
                error = %e,
                "Failed to persist last sync date"
            );
            result
                .errors
                .push(SyncError::from_error(&e, platform, None));
        }
    }

    /// Converts internal records and writes them to a writable platform
    ///
    /// # Errors
    ///
    /// `UnsupportedOperation` for read-only platforms, `PlatformDisabled` when
    /// the platform is not enabled. Conversion and push failures of single
    /// records are recorded in the result.
    pub async fn export_data(
        &self,
        platform: Platform,
        records: &[HealthRecord],
        user: &UserId,
    ) -> Result<ExportResult> {
        let adapter = match self.adapters.get(&platform) {
            Some(adapter) if adapter.supports_write() => adapter.clone(),
            _ => {
                return Err(MeridianError::UnsupportedOperation {
                    platform,
                    operation: "export".to_string(),
                })
            }
        };
        if !self.registry.user(user).read().await.is_enabled(platform) {
            return Err(MeridianError::PlatformDisabled(platform));
        }

        let mut result = ExportResult::new(platform);
        let batch = to_canonical(records, user);
        for failure in &batch.failures {
            let metric = records.get(failure.index).map(|r| r.metric.clone());
            result
                .errors
                .push(SyncError::for_item(failure, platform, metric));
        }

        if !batch.converted.is_empty() {
            match adapter.push_observations(&batch.converted).await {
                Ok(report) => {
                    result.pushed = report.accepted;
                    for rejected in &report.rejected {
                        let metric = batch
                            .converted
                            .get(rejected.index)
                            .and_then(|o| o.metric_kind().ok())
                            .map(|k| k.to_string());
                        result
                            .errors
                            .push(SyncError::for_item(rejected, platform, metric));
                    }
                }
                Err(e) => {
                    tracing::error!(platform = %platform, error = %e, "Push failed");
                    result.errors.push(SyncError::from_error(&e, platform, None));
                }
            }
        }

        result.log_summary();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::config_store::MemoryConfigStore;
    use async_trait::async_trait;
    use chrono::TimeZone;

    /// Adapter returning one fixed heart rate reading per import
    struct FixedAdapter {
        available: bool,
    }

    #[async_trait]
    impl PlatformAdapter for FixedAdapter {
        fn platform(&self) -> Platform {
            Platform::GoogleFit
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        async fn request_permissions(&self, _kinds: &[MetricKind]) -> Result<bool> {
            Ok(true)
        }

        fn native_type(&self, kind: MetricKind) -> Option<&'static str> {
            (kind == MetricKind::HeartRate).then_some("hr")
        }

        async fn import_metric(
            &self,
            kind: MetricKind,
            _range: TimeRange,
            user: &UserId,
        ) -> Result<ConversionBatch<Observation>> {
            let mut batch = ConversionBatch::new();
            if kind != MetricKind::HeartRate {
                return Err(MeridianError::unmapped_metric(kind, Platform::GoogleFit));
            }
            batch.push(
                Observation::builder(kind)
                    .subject(user)
                    .effective(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap())
                    .canonical_quantity(72.0)
                    .build()?,
            );
            Ok(batch)
        }
    }

    fn coordinator(available: bool) -> SyncCoordinator {
        SyncCoordinator::new(Arc::new(MemoryConfigStore::new()), &SyncConfig::default())
            .with_adapter(Arc::new(FixedAdapter { available }))
    }

    fn day() -> TimeRange {
        TimeRange::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_import_requires_enabled_platform() {
        let coordinator = coordinator(true);
        let user = UserId::new("u1").unwrap();
        let (_tx, rx) = watch::channel(false);

        let err = coordinator
            .import_data(Platform::GoogleFit, &[MetricKind::HeartRate], &user, day(), rx)
            .await
            .unwrap_err();
        assert!(matches!(err, MeridianError::PlatformDisabled(Platform::GoogleFit)));
    }

    #[tokio::test]
    async fn test_enable_unavailable_platform_is_noop() {
        let coordinator = coordinator(false);
        let user = UserId::new("u1").unwrap();

        let enabled = coordinator
            .enable_data_source(&user, Platform::GoogleFit, None)
            .await
            .unwrap();
        assert!(!enabled);
        assert_eq!(coordinator.data_sources(&user).await.len(), 1);
    }

    #[tokio::test]
    async fn test_import_records_unmapped_kind_and_stamps_sync() {
        let coordinator = coordinator(true);
        let user = UserId::new("u1").unwrap();
        let (_tx, rx) = watch::channel(false);
        assert!(coordinator
            .enable_data_source(&user, Platform::GoogleFit, None)
            .await
            .unwrap());

        let result = coordinator
            .import_data(
                Platform::GoogleFit,
                &[MetricKind::HeartRate, MetricKind::ActiveEnergy, MetricKind::HeartRate],
                &user,
                day(),
                rx,
            )
            .await
            .unwrap();

        assert_eq!(result.observations.len(), 1);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].source, Some(Platform::GoogleFit));
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].error_type, SyncErrorType::UnsupportedMetric);

        let sources = coordinator.data_sources(&user).await;
        let fit = sources
            .iter()
            .find(|c| c.platform == Platform::GoogleFit)
            .unwrap();
        assert!(fit.last_sync_date.is_some());
    }

    #[tokio::test]
    async fn test_export_to_read_only_platform_is_rejected() {
        let coordinator = coordinator(true);
        let user = UserId::new("u1").unwrap();
        let err = coordinator
            .export_data(Platform::GoogleFit, &[], &user)
            .await
            .unwrap_err();
        assert!(matches!(err, MeridianError::UnsupportedOperation { .. }));
    }

    #[tokio::test]
    async fn test_disable_self_is_rejected() {
        let coordinator = coordinator(true);
        let user = UserId::new("u1").unwrap();
        assert!(coordinator
            .disable_data_source(&user, Platform::SelfTracked)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_available_sources_always_include_self() {
        let coordinator = coordinator(false);
        assert_eq!(
            coordinator.get_available_data_sources().await,
            vec![Platform::SelfTracked]
        );
    }
}
