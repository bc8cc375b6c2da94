//! Platform adapter contract
//!
//! Every external source is wrapped by one adapter that translates its native
//! records into canonical Observations. The coordinator only talks to adapters
//! through [`PlatformAdapter`]; the native query and conversion steps are
//! inherent methods on each adapter because their record types differ.

use crate::core::transform::{ConversionBatch, ItemFailure};
use crate::domain::{
    MeridianError, MetricKind, Observation, Platform, Result, SourceSettings, TimeRange, UserId,
};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// Default timeout for every bridge call
pub const DEFAULT_BRIDGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of pushing a batch of Observations to a writable platform
#[derive(Debug, Default)]
pub struct PushReport {
    /// Observations the platform accepted
    pub accepted: usize,

    /// Observations the platform rejected, indexed into the pushed batch
    pub rejected: Vec<ItemFailure>,
}

impl PushReport {
    /// Whether every pushed Observation was accepted
    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Contract implemented by every platform adapter
///
/// Methods that reach the platform's bridge are suspension points and honor
/// the adapter's configured timeout.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Platform this adapter serves
    fn platform(&self) -> Platform;

    /// Whether the platform can be reached right now
    ///
    /// Never fails: bridge errors and timeouts report `false`.
    async fn is_available(&self) -> bool;

    /// Asks the platform for read access to the given kinds in one call
    ///
    /// Callers pass only kinds for which [`native_type`](Self::native_type)
    /// returns a mapping.
    async fn request_permissions(&self, kinds: &[MetricKind]) -> Result<bool>;

    /// Native data type identifier of a metric kind on this platform
    fn native_type(&self, kind: MetricKind) -> Option<&'static str>;

    /// Fetches and converts one kind over `[range.start, range.end)`
    ///
    /// Sleep kinds go through the adapter's sleep aggregation path.
    /// Per-record conversion failures are returned in the batch; fetch
    /// failures are returned as `Err`.
    async fn import_metric(
        &self,
        kind: MetricKind,
        range: TimeRange,
        user: &UserId,
    ) -> Result<ConversionBatch<Observation>>;

    /// Whether the platform accepts writes
    fn supports_write(&self) -> bool {
        false
    }

    /// Writes canonical Observations to the platform
    async fn push_observations(&self, _observations: &[Observation]) -> Result<PushReport> {
        Err(MeridianError::UnsupportedOperation {
            platform: self.platform(),
            operation: "push_observations".to_string(),
        })
    }

    /// Receives one user's persisted source settings
    ///
    /// Adapters are shared by every user, so settings are kept per user.
    async fn apply_settings(&self, _user: &UserId, _settings: &SourceSettings) -> Result<()> {
        Ok(())
    }
}

/// Runs a bridge call under a timeout
///
/// # Errors
///
/// Returns `Timeout` naming the operation when `limit` elapses first, or the
/// call's own error.
pub async fn with_timeout<T, F>(operation: &str, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                operation = operation,
                timeout_secs = limit.as_secs(),
                "Bridge call timed out"
            );
            Err(MeridianError::Timeout {
                operation: operation.to_string(),
                seconds: limit.as_secs(),
            })
        }
    }
}

/// Probes availability under a timeout, reporting `false` when it elapses
pub async fn probe_with_timeout<F>(platform: Platform, limit: Duration, probe: F) -> bool
where
    F: Future<Output = bool>,
{
    match tokio::time::timeout(limit, probe).await {
        Ok(available) => available,
        Err(_) => {
            tracing::warn!(
                platform = %platform,
                timeout_secs = limit.as_secs(),
                "Availability probe timed out"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_elapses() {
        let result: Result<()> = with_timeout("query_records", Duration::from_secs(5), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;

        match result {
            Err(MeridianError::Timeout { operation, seconds }) => {
                assert_eq!(operation, "query_records");
                assert_eq!(seconds, 5);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_with_timeout_passes_through() {
        let result = with_timeout("authenticate", Duration::from_secs(5), async {
            Ok::<_, MeridianError>(7)
        })
        .await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_timeout_reports_unavailable() {
        let available = probe_with_timeout(Platform::Clinical, Duration::from_secs(1), async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            true
        })
        .await;
        assert!(!available);
    }
}
