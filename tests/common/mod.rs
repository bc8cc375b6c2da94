//! Shared fakes for integration tests
//!
//! In-process stand-ins for the wearable bridges and the FHIR gateway.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use meridian::adapters::clinical::{
    EntryOutcome, FhirGateway, ObservationQuery, PatientSummary, TokenRequest, TokenResponse,
};
use meridian::adapters::google_fit::{FitBridge, FitDataPoint, FitValue};
use meridian::config::{secret_string, SecretString, SyncConfig};
use meridian::domain::{MeridianError, Observation, Result, TimeRange, UserId};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;

pub const HEART_RATE: &str = "com.google.heart_rate.bpm";
pub const STEPS: &str = "com.google.step_count.delta";
pub const OXYGEN: &str = "com.google.oxygen_saturation";
pub const ACTIVE_ENERGY: &str = "com.google.calories.expended";

pub fn user() -> UserId {
    UserId::new("u1").unwrap()
}

pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, hour, minute, 0).unwrap()
}

pub fn day() -> TimeRange {
    TimeRange::new(at(0, 0), Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap()).unwrap()
}

pub fn sync_config(max_concurrent_queries: usize) -> SyncConfig {
    SyncConfig {
        timeout_seconds: 5,
        max_concurrent_queries,
        persist_after_import: true,
    }
}

pub fn fit_point(data_type: &str, start: DateTime<Utc>, value: FitValue) -> FitDataPoint {
    FitDataPoint {
        data_type_name: data_type.to_string(),
        start_time_nanos: start.timestamp_nanos_opt().unwrap(),
        end_time_nanos: (start + chrono::Duration::minutes(1))
            .timestamp_nanos_opt()
            .unwrap(),
        value: vec![value],
        origin_data_source_id: None,
    }
}

/// How the fake Fit bridge answers one data type
pub enum FitAnswer {
    Points(Vec<FitDataPoint>),
    Fail(String),
    /// Never answers
    Hang,
    /// Flips the cancel channel, then never answers
    CancelAndHang(watch::Sender<bool>),
}

/// Google Fit bridge answering from a table
#[derive(Default)]
pub struct FakeFitBridge {
    answers: Mutex<HashMap<String, FitAnswer>>,
    calls: Mutex<Vec<String>>,
    declines_permissions: bool,
}

impl FakeFitBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(self, data_type: &str, answer: FitAnswer) -> Self {
        self.answers
            .lock()
            .unwrap()
            .insert(data_type.to_string(), answer);
        self
    }

    /// Answers every permission request with "not granted"
    pub fn declining_permissions(mut self) -> Self {
        self.declines_permissions = true;
        self
    }

    /// Data types queried so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FitBridge for FakeFitBridge {
    async fn is_available(&self) -> bool {
        true
    }

    async fn request_permissions(&self, _data_types: &[&str]) -> Result<bool> {
        Ok(!self.declines_permissions)
    }

    async fn read_data_points(
        &self,
        data_type: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<FitDataPoint>> {
        self.calls.lock().unwrap().push(data_type.to_string());
        {
            let answers = self.answers.lock().unwrap();
            match answers.get(data_type) {
                None => return Ok(Vec::new()),
                Some(FitAnswer::Points(points)) => return Ok(points.clone()),
                Some(FitAnswer::Fail(message)) => {
                    return Err(MeridianError::Availability(message.clone()))
                }
                Some(FitAnswer::Hang) => {}
                Some(FitAnswer::CancelAndHang(cancel)) => {
                    let _ = cancel.send(true);
                }
            }
        }
        std::future::pending().await
    }
}

/// FHIR gateway counting token requests and recording searches
pub struct FakeFhirGateway {
    pub token_requests: AtomicUsize,
    token_delay: Duration,
    reject_tokens: bool,
    expires_in: Option<u64>,
    resources: Vec<serde_json::Value>,
    searched_patients: Mutex<Vec<String>>,
    submitted: Mutex<Vec<Observation>>,
    reject_index: Option<usize>,
    /// Searches still to be answered with 401
    pub expired_searches: AtomicUsize,
}

impl FakeFhirGateway {
    pub fn new() -> Self {
        Self {
            token_requests: AtomicUsize::new(0),
            token_delay: Duration::ZERO,
            reject_tokens: false,
            expires_in: Some(3600),
            resources: Vec::new(),
            searched_patients: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            reject_index: None,
            expired_searches: AtomicUsize::new(0),
        }
    }

    pub fn with_token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = delay;
        self
    }

    /// Answers every token request with `invalid_client`
    pub fn rejecting_tokens(mut self) -> Self {
        self.reject_tokens = true;
        self
    }

    pub fn with_expires_in(mut self, expires_in: Option<u64>) -> Self {
        self.expires_in = expires_in;
        self
    }

    pub fn with_resources(mut self, resources: Vec<serde_json::Value>) -> Self {
        self.resources = resources;
        self
    }

    /// Answers the transaction entry at `index` with 422
    pub fn rejecting(mut self, index: usize) -> Self {
        self.reject_index = Some(index);
        self
    }

    pub fn token_count(&self) -> usize {
        self.token_requests.load(Ordering::SeqCst)
    }

    pub fn searched_patients(&self) -> Vec<String> {
        self.searched_patients.lock().unwrap().clone()
    }

    pub fn submitted(&self) -> Vec<Observation> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl FhirGateway for FakeFhirGateway {
    async fn is_reachable(&self) -> bool {
        true
    }

    async fn discover_token_endpoint(&self) -> Result<String> {
        Ok("https://ehr.example.org/oauth/token".to_string())
    }

    async fn request_token(&self, _request: &TokenRequest) -> Result<TokenResponse> {
        let n = self.token_requests.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.token_delay.is_zero() {
            tokio::time::sleep(self.token_delay).await;
        }
        if self.reject_tokens {
            return Err(MeridianError::Authentication(
                "token endpoint rejected the request: invalid_client".to_string(),
            ));
        }
        Ok(TokenResponse {
            access_token: secret_string(format!("token-{n}")),
            expires_in: self.expires_in,
            token_type: Some("Bearer".to_string()),
        })
    }

    async fn search_observations(
        &self,
        _token: &SecretString,
        query: &ObservationQuery,
    ) -> Result<Vec<serde_json::Value>> {
        self.searched_patients
            .lock()
            .unwrap()
            .push(query.patient_id.clone());
        if self
            .expired_searches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(MeridianError::Authentication(
                "FHIR server rejected credentials with status 401 Unauthorized".to_string(),
            ));
        }
        Ok(self
            .resources
            .iter()
            .filter(|r| r["code"]["coding"][0]["code"] == json!(query.code))
            .cloned()
            .collect())
    }

    async fn read_patient(&self, _token: &SecretString, patient_id: &str) -> Result<PatientSummary> {
        Ok(PatientSummary {
            id: patient_id.to_string(),
            name: Some("Ada Example".to_string()),
            birth_date: None,
            gender: None,
        })
    }

    async fn submit_observations(
        &self,
        _token: &SecretString,
        observations: &[Observation],
    ) -> Result<Vec<EntryOutcome>> {
        self.submitted
            .lock()
            .unwrap()
            .extend(observations.iter().cloned());
        Ok((0..observations.len())
            .map(|i| {
                if Some(i) == self.reject_index {
                    EntryOutcome {
                        status: "422 Unprocessable Entity".to_string(),
                        location: None,
                    }
                } else {
                    EntryOutcome {
                        status: "201 Created".to_string(),
                        location: Some(format!("Observation/srv-{i}/_history/1")),
                    }
                }
            })
            .collect())
    }
}

/// A server-side heart rate Observation in beats per minute
pub fn clinical_heart_rate(id: &str, value: f64, at: DateTime<Utc>) -> serde_json::Value {
    json!({
        "resourceType": "Observation",
        "id": id,
        "status": "final",
        "code": {"coding": [{"system": "http://loinc.org", "code": "8867-4"}]},
        "subject": {"reference": "Patient/p-17"},
        "effectiveDateTime": at.to_rfc3339(),
        "valueQuantity": {"value": value, "unit": "beats/minute", "code": "/min"}
    })
}
