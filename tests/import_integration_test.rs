//! Integration tests for imports through the sync coordinator
//!
//! These tests verify that:
//! - One failing metric kind does not abort the others
//! - Repeated imports of unchanged data give equivalent Observations
//! - Cancellation keeps finished kinds and starts nothing new
//! - A hung bridge query becomes a timeout for its kind only
//! - Clinical Observations land under the app user's subject

mod common;

use common::*;
use meridian::adapters::clinical::{ClinicalAdapter, Credentials, PATIENT_ID_SETTING};
use meridian::adapters::config_store::MemoryConfigStore;
use meridian::adapters::google_fit::{FitValue, GoogleFitAdapter};
use meridian::config::secret_string;
use meridian::core::sync::{SyncCoordinator, SyncErrorType};
use meridian::domain::{MeridianError, MetricKind, Platform, SourceSettings, LOINC_SYSTEM};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

fn fit_coordinator(bridge: Arc<FakeFitBridge>, max_concurrent: usize) -> SyncCoordinator {
    SyncCoordinator::new(Arc::new(MemoryConfigStore::new()), &sync_config(max_concurrent))
        .with_adapter(Arc::new(GoogleFitAdapter::new(bridge)))
}

async fn enable(coordinator: &SyncCoordinator, platform: Platform) {
    coordinator.configure(&user()).await.unwrap();
    assert!(coordinator
        .enable_data_source(&user(), platform, None)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_partial_failure_keeps_other_kinds() {
    let bridge = Arc::new(
        FakeFitBridge::new()
            .answer(
                HEART_RATE,
                FitAnswer::Points(vec![
                    fit_point(HEART_RATE, at(8, 0), FitValue::fp(72.0)),
                    fit_point(HEART_RATE, at(9, 0), FitValue::fp(80.0)),
                ]),
            )
            .answer(STEPS, FitAnswer::Fail("fitness API down".to_string()))
            .answer(
                ACTIVE_ENERGY,
                FitAnswer::Points(vec![fit_point(ACTIVE_ENERGY, at(8, 0), FitValue::fp(120.0))]),
            ),
    );
    let coordinator = fit_coordinator(bridge, 4);
    enable(&coordinator, Platform::GoogleFit).await;

    let (_tx, cancel) = watch::channel(false);
    let result = coordinator
        .import_data(
            Platform::GoogleFit,
            &[MetricKind::HeartRate, MetricKind::Steps, MetricKind::ActiveEnergy],
            &user(),
            day(),
            cancel,
        )
        .await
        .unwrap();

    assert_eq!(result.observations.len(), 2);
    assert_eq!(result.records.len(), 2);
    assert!(result.records.iter().all(|r| r.metric == "heart_rate"));
    assert!(result.records.iter().all(|r| r.source == Some(Platform::GoogleFit)));

    let steps = result.errors_for(MetricKind::Steps);
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].error_type, SyncErrorType::Availability);
    assert!(steps[0].retryable);

    let energy = result.errors_for(MetricKind::ActiveEnergy);
    assert_eq!(energy.len(), 1);
    assert_eq!(energy[0].error_type, SyncErrorType::UnsupportedMetric);
    assert!(!result.cancelled);
}

#[tokio::test]
async fn test_kind_without_vocabulary_entry_skips_bridge() {
    let bridge = Arc::new(FakeFitBridge::new());
    let coordinator = fit_coordinator(bridge.clone(), 2);
    enable(&coordinator, Platform::GoogleFit).await;

    let (_tx, cancel) = watch::channel(false);
    let result = coordinator
        .import_data(
            Platform::GoogleFit,
            &[MetricKind::ActiveEnergy],
            &user(),
            day(),
            cancel,
        )
        .await
        .unwrap();

    let energy = result.errors_for(MetricKind::ActiveEnergy);
    assert_eq!(energy.len(), 1);
    assert_eq!(energy[0].error_type, SyncErrorType::UnsupportedMetric);
    assert!(result.observations.is_empty());
    assert!(bridge.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_hung_query_times_out_without_blocking_other_kinds() {
    let bridge = Arc::new(
        FakeFitBridge::new()
            .answer(
                HEART_RATE,
                FitAnswer::Points(vec![fit_point(HEART_RATE, at(8, 0), FitValue::fp(72.0))]),
            )
            .answer(STEPS, FitAnswer::Hang),
    );
    let config = sync_config(2);
    let adapter = GoogleFitAdapter::new(bridge.clone())
        .with_timeout(Duration::from_secs(config.timeout_seconds));
    let coordinator = SyncCoordinator::new(Arc::new(MemoryConfigStore::new()), &config)
        .with_adapter(Arc::new(adapter));
    enable(&coordinator, Platform::GoogleFit).await;

    let (_tx, cancel) = watch::channel(false);
    let result = coordinator
        .import_data(
            Platform::GoogleFit,
            &[MetricKind::HeartRate, MetricKind::Steps],
            &user(),
            day(),
            cancel,
        )
        .await
        .unwrap();

    assert!(!result.cancelled);
    assert_eq!(result.observations.len(), 1);
    assert_eq!(result.records[0].metric, "heart_rate");

    let steps = result.errors_for(MetricKind::Steps);
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].error_type, SyncErrorType::Timeout);
    assert_eq!(result.errors.len(), 1);
}

#[tokio::test]
async fn test_repeated_import_is_idempotent() {
    let points = vec![
        fit_point(HEART_RATE, at(9, 0), FitValue::fp(80.0)),
        fit_point(HEART_RATE, at(8, 0), FitValue::fp(72.0)),
        // Same reading reported twice
        fit_point(HEART_RATE, at(8, 0), FitValue::fp(72.0)),
    ];
    let bridge = Arc::new(FakeFitBridge::new().answer(HEART_RATE, FitAnswer::Points(points)));
    let coordinator = fit_coordinator(bridge, 2);
    enable(&coordinator, Platform::GoogleFit).await;

    let mut runs = Vec::new();
    for _ in 0..2 {
        let (_tx, cancel) = watch::channel(false);
        let result = coordinator
            .import_data(
                Platform::GoogleFit,
                &[MetricKind::HeartRate, MetricKind::HeartRate],
                &user(),
                day(),
                cancel,
            )
            .await
            .unwrap();
        assert!(result.is_clean());
        runs.push(
            result
                .observations
                .iter()
                .map(|o| o.fingerprint())
                .collect::<Vec<_>>(),
        );
    }

    assert_eq!(runs[0].len(), 2);
    assert_eq!(runs[0], runs[1]);
}

#[tokio::test]
async fn test_observations_ordered_by_effective_time() {
    let bridge = Arc::new(
        FakeFitBridge::new()
            .answer(
                HEART_RATE,
                FitAnswer::Points(vec![fit_point(HEART_RATE, at(10, 0), FitValue::fp(75.0))]),
            )
            .answer(
                STEPS,
                FitAnswer::Points(vec![fit_point(STEPS, at(7, 0), FitValue::int(900))]),
            ),
    );
    let coordinator = fit_coordinator(bridge, 4);
    enable(&coordinator, Platform::GoogleFit).await;

    let (_tx, cancel) = watch::channel(false);
    let result = coordinator
        .import_data(
            Platform::GoogleFit,
            &[MetricKind::HeartRate, MetricKind::Steps],
            &user(),
            day(),
            cancel,
        )
        .await
        .unwrap();

    let times: Vec<_> = result
        .observations
        .iter()
        .map(|o| o.effective_date_time())
        .collect();
    assert_eq!(times, vec![at(7, 0), at(10, 0)]);
}

#[tokio::test]
async fn test_cancellation_keeps_finished_kinds() {
    let (cancel_tx, cancel) = watch::channel(false);
    let bridge = Arc::new(
        FakeFitBridge::new()
            .answer(
                HEART_RATE,
                FitAnswer::Points(vec![fit_point(HEART_RATE, at(8, 0), FitValue::fp(72.0))]),
            )
            .answer(STEPS, FitAnswer::CancelAndHang(cancel_tx)),
    );
    let coordinator = fit_coordinator(bridge.clone(), 1);
    enable(&coordinator, Platform::GoogleFit).await;

    let result = coordinator
        .import_data(
            Platform::GoogleFit,
            &[MetricKind::HeartRate, MetricKind::Steps, MetricKind::OxygenSaturation],
            &user(),
            day(),
            cancel,
        )
        .await
        .unwrap();

    assert!(result.cancelled);
    assert_eq!(result.observations.len(), 1);
    assert!(result.errors.is_empty());
    // Oxygen saturation was never started
    assert_eq!(bridge.calls(), vec![HEART_RATE.to_string(), STEPS.to_string()]);
}

#[tokio::test]
async fn test_import_from_disabled_platform_fails() {
    let bridge = Arc::new(FakeFitBridge::new());
    let coordinator = fit_coordinator(bridge.clone(), 2);
    coordinator.configure(&user()).await.unwrap();

    let (_tx, cancel) = watch::channel(false);
    let err = coordinator
        .import_data(
            Platform::GoogleFit,
            &[MetricKind::HeartRate],
            &user(),
            day(),
            cancel,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, MeridianError::PlatformDisabled(Platform::GoogleFit)));
    assert!(bridge.calls().is_empty());
}

#[tokio::test]
async fn test_import_records_last_sync_date() {
    let coordinator = fit_coordinator(Arc::new(FakeFitBridge::new()), 2);
    enable(&coordinator, Platform::GoogleFit).await;

    let (_tx, cancel) = watch::channel(false);
    coordinator
        .import_data(
            Platform::GoogleFit,
            &[MetricKind::HeartRate],
            &user(),
            day(),
            cancel,
        )
        .await
        .unwrap();

    let fit = coordinator
        .data_sources(&user())
        .await
        .into_iter()
        .find(|c| c.platform == Platform::GoogleFit)
        .unwrap();
    assert!(fit.last_sync_date.is_some());
}

#[tokio::test]
async fn test_clinical_heart_rate_import() {
    let gateway = Arc::new(
        FakeFhirGateway::new().with_resources(vec![clinical_heart_rate("srv-1", 72.0, at(8, 0))]),
    );
    let credentials = Credentials::client_credentials(
        "https://ehr.example.org/oauth/token",
        "meridian",
        secret_string("s3cret".to_string()),
    );
    let coordinator = SyncCoordinator::new(Arc::new(MemoryConfigStore::new()), &sync_config(2))
        .with_adapter(Arc::new(ClinicalAdapter::new(gateway.clone(), credentials)));
    coordinator.configure(&user()).await.unwrap();

    let mut settings = SourceSettings::new();
    settings.insert(PATIENT_ID_SETTING.to_string(), "p-17".to_string());
    assert!(coordinator
        .enable_data_source(&user(), Platform::Clinical, Some(settings))
        .await
        .unwrap());

    let (_tx, cancel) = watch::channel(false);
    let result = coordinator
        .import_data(
            Platform::Clinical,
            &[MetricKind::HeartRate],
            &user(),
            day(),
            cancel,
        )
        .await
        .unwrap();

    assert!(result.is_clean());
    assert_eq!(gateway.searched_patients(), vec!["p-17".to_string()]);
    assert_eq!(gateway.token_count(), 1);

    let observation = &result.observations[0];
    assert_eq!(observation.subject().reference, "Patient/u1");
    let coding = observation.primary_coding().unwrap();
    assert_eq!(coding.system, LOINC_SYSTEM);
    assert_eq!(coding.code, "8867-4");
    let quantity = observation.quantity().unwrap();
    assert_eq!(quantity.value, 72.0);
    assert_eq!(quantity.code, "/min");

    assert_eq!(result.records[0].value, 72.0);
    assert_eq!(result.records[0].metric, "heart_rate");
    assert_eq!(result.records[0].source, Some(Platform::Clinical));
}
