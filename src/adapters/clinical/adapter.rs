//! Clinical FHIR adapter
//!
//! The only writable platform. Reads Observations for the user's Patient,
//! converts them into canonical form under the app user's subject, and pushes
//! canonical Observations back as a transaction Bundle.

use super::auth::{AuthSession, AuthState, Credentials, SessionManager};
use super::client::FhirGatewayClient;
use super::gateway::{FhirGateway, ObservationQuery};
use super::models::{EntryOutcome, FhirObservation, PatientSummary};
use crate::adapters::platform::{
    probe_with_timeout, with_timeout, PlatformAdapter, PushReport, DEFAULT_BRIDGE_TIMEOUT,
};
use crate::config::ClinicalConfig;
use crate::core::transform::{measurement_to_observation, ConversionBatch, ItemFailure};
use crate::domain::{
    DeviceId, GatewayError, MeridianError, MetricKind, Observation, Platform, Result,
    SourceSettings, TimeRange, Unit, UserId,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Settings key naming the FHIR Patient id of the user
pub const PATIENT_ID_SETTING: &str = "patient_id";

/// Adapter for a clinical FHIR server
pub struct ClinicalAdapter {
    gateway: Arc<dyn FhirGateway>,
    session: SessionManager,
    patient_ids: RwLock<HashMap<UserId, String>>,
    timeout: Duration,
}

impl ClinicalAdapter {
    pub fn new(gateway: Arc<dyn FhirGateway>, credentials: Credentials) -> Self {
        Self {
            session: SessionManager::new(gateway.clone(), credentials),
            gateway,
            patient_ids: RwLock::new(HashMap::new()),
            timeout: DEFAULT_BRIDGE_TIMEOUT,
        }
    }

    /// Builds the adapter over the HTTP gateway described by `[clinical]`
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for an unusable base URL or incomplete
    /// credentials.
    pub fn from_config(config: &ClinicalConfig, timeout: Duration) -> Result<Self> {
        let gateway = Arc::new(FhirGatewayClient::new(config)?);
        let credentials = Credentials::from_config(config)?;
        Ok(Self::new(gateway, credentials).with_timeout(timeout))
    }

    /// Overrides the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Requests a new token, replacing any current session
    pub async fn authenticate(&self) -> Result<AuthSession> {
        with_timeout(
            "clinical.authenticate",
            self.timeout,
            self.session.authenticate(),
        )
        .await
    }

    /// Returns the current session, authenticating if it is missing or expired
    pub async fn ensure_authenticated(&self) -> Result<AuthSession> {
        with_timeout(
            "clinical.authenticate",
            self.timeout,
            self.session.ensure_authenticated(),
        )
        .await
    }

    pub fn invalidate(&self) {
        self.session.invalidate();
    }

    pub fn auth_state(&self) -> AuthState {
        self.session.state()
    }

    /// Patient id searched for `user`: that user's configured setting, else
    /// the user id
    pub fn patient_id_for(&self, user: &UserId) -> String {
        self.patient_ids
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(user)
            .cloned()
            .unwrap_or_else(|| user.as_str().to_string())
    }

    /// Runs a gateway call with a valid session; a rejected token drops the
    /// session so the next call re-authenticates
    async fn authorized<T, F, Fut>(&self, operation: &str, call: F) -> Result<T>
    where
        F: FnOnce(AuthSession) -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let session = self.ensure_authenticated().await?;
        match with_timeout(operation, self.timeout, call(session)).await {
            Err(MeridianError::Authentication(message)) => {
                tracing::warn!(
                    operation = operation,
                    "Clinical server rejected the access token, invalidating session"
                );
                self.session.invalidate();
                Err(MeridianError::Authentication(message))
            }
            other => other,
        }
    }

    /// Reads a Patient's demographics
    pub async fn fetch_patient(&self, patient_id: &str) -> Result<PatientSummary> {
        let gateway = &self.gateway;
        self.authorized("clinical.fetch_patient", |session| async move {
            gateway.read_patient(session.access_token(), patient_id).await
        })
        .await
    }

    /// Searches raw Observation resources of one kind for `user`
    pub async fn query_records(
        &self,
        kind: MetricKind,
        range: TimeRange,
        user: &UserId,
    ) -> Result<Vec<serde_json::Value>> {
        let code = self
            .native_type(kind)
            .ok_or_else(|| MeridianError::unmapped_metric(kind, Platform::Clinical))?;
        let query = ObservationQuery {
            patient_id: self.patient_id_for(user),
            code: code.to_string(),
            range,
        };
        let gateway = &self.gateway;
        let query = &query;
        self.authorized("clinical.query_records", |session| async move {
            gateway
                .search_observations(session.access_token(), query)
                .await
        })
        .await
    }

    /// Converts server Observations; the subject becomes the app user
    pub fn convert_to_canonical(
        &self,
        resources: &[serde_json::Value],
        user: &UserId,
    ) -> ConversionBatch<Observation> {
        let mut batch = ConversionBatch::new();
        for (index, resource) in resources.iter().enumerate() {
            let label = resource
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or("Observation/<no id>")
                .to_string();
            match convert_resource(resource, user) {
                Ok(observation) => batch.push(observation),
                Err(e) => {
                    tracing::warn!(
                        observation = %label,
                        error = %e,
                        "Skipping clinical Observation"
                    );
                    batch.fail(index, label, e);
                }
            }
        }
        batch
    }
}

fn convert_resource(resource: &serde_json::Value, user: &UserId) -> Result<Observation> {
    let observation: FhirObservation = serde_json::from_value(resource.clone())
        .map_err(|e| MeridianError::Conversion(format!("malformed Observation: {e}")))?;

    let kind = observation
        .codings()
        .iter()
        .find_map(|c| match (&c.system, &c.code) {
            (Some(system), Some(code)) => MetricKind::from_code(system, code).ok(),
            _ => None,
        })
        .ok_or_else(|| {
            let codes: Vec<&str> = observation
                .codings()
                .iter()
                .filter_map(|c| c.code.as_deref())
                .collect();
            MeridianError::unsupported_metric(
                codes.join(","),
                "no coding in the canonical vocabulary",
            )
        })?;

    let at = observation.effective_date_time.ok_or_else(|| {
        MeridianError::Conversion(format!("{} has no effectiveDateTime", observation.label()))
    })?;
    let quantity = observation.value_quantity.as_ref().ok_or_else(|| {
        MeridianError::Conversion(format!("{} has no valueQuantity", observation.label()))
    })?;
    let unit = match quantity.code.as_deref().or(quantity.unit.as_deref()) {
        Some(raw) => Unit::parse(raw)?,
        None => kind.code_entry()?.unit,
    };
    let device = observation
        .device
        .as_ref()
        .and_then(|d| DeviceId::from_reference(&d.reference));

    measurement_to_observation(kind, quantity.value, unit, at, user, device)
}

/// Pairs transaction outcomes with the pushed Observations
///
/// An Observation without an outcome counts as rejected.
fn push_report(observations: &[Observation], outcomes: Vec<EntryOutcome>) -> PushReport {
    let mut report = PushReport::default();
    if outcomes.len() != observations.len() {
        tracing::warn!(
            pushed = observations.len(),
            outcomes = outcomes.len(),
            "Transaction response does not match the submitted Bundle"
        );
    }
    let mut outcomes = outcomes.into_iter();
    for (index, observation) in observations.iter().enumerate() {
        let Some(outcome) = outcomes.next() else {
            report.rejected.push(ItemFailure::new(
                index,
                observation.id(),
                GatewayError::InvalidResponse(
                    "transaction response has no entry for this Observation".to_string(),
                )
                .into(),
            ));
            continue;
        };
        if outcome.is_success() {
            report.accepted += 1;
            continue;
        }
        let status = outcome
            .status
            .split_whitespace()
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        report.rejected.push(ItemFailure::new(
            index,
            observation.id(),
            GatewayError::ClientError {
                status,
                message: outcome.status,
            }
            .into(),
        ));
    }
    report
}

#[async_trait]
impl PlatformAdapter for ClinicalAdapter {
    fn platform(&self) -> Platform {
        Platform::Clinical
    }

    async fn is_available(&self) -> bool {
        probe_with_timeout(Platform::Clinical, self.timeout, self.gateway.is_reachable()).await
    }

    /// Access on a clinical server is granted by the token's scope
    async fn request_permissions(&self, _kinds: &[MetricKind]) -> Result<bool> {
        self.ensure_authenticated().await?;
        Ok(true)
    }

    fn native_type(&self, kind: MetricKind) -> Option<&'static str> {
        kind.code_entry().ok().map(|entry| entry.code)
    }

    async fn import_metric(
        &self,
        kind: MetricKind,
        range: TimeRange,
        user: &UserId,
    ) -> Result<ConversionBatch<Observation>> {
        let resources = self.query_records(kind, range, user).await?;
        Ok(self.convert_to_canonical(&resources, user))
    }

    fn supports_write(&self) -> bool {
        true
    }

    async fn push_observations(&self, observations: &[Observation]) -> Result<PushReport> {
        if observations.is_empty() {
            return Ok(PushReport::default());
        }
        let gateway = &self.gateway;
        let outcomes = self
            .authorized("clinical.push_observations", |session| async move {
                gateway
                    .submit_observations(session.access_token(), observations)
                    .await
            })
            .await?;
        let report = push_report(observations, outcomes);
        tracing::info!(
            accepted = report.accepted,
            rejected = report.rejected.len(),
            "Pushed Observations to clinical server"
        );
        Ok(report)
    }

    async fn apply_settings(&self, user: &UserId, settings: &SourceSettings) -> Result<()> {
        let patient_id = settings.get(PATIENT_ID_SETTING).cloned();
        tracing::debug!(user_id = %user, patient_id = ?patient_id, "Applying clinical settings");
        let mut patient_ids = self.patient_ids.write().unwrap_or_else(|e| e.into_inner());
        match patient_id {
            Some(id) => patient_ids.insert(user.clone(), id),
            None => patient_ids.remove(user),
        };
        Ok(())
    }
}
