//! Clinical FHIR gateway contract
//!
//! The clinical adapter reaches the FHIR server and its token endpoint only
//! through [`FhirGateway`], so tests can substitute an in-process fake for the
//! HTTP client.

use super::models::{EntryOutcome, PatientSummary, TokenRequest, TokenResponse};
use crate::config::SecretString;
use crate::domain::{Observation, Result, TimeRange};
use async_trait::async_trait;

/// Observation search parameters
#[derive(Debug, Clone)]
pub struct ObservationQuery {
    /// FHIR Patient id the search is scoped to
    pub patient_id: String,

    /// LOINC code searched for
    pub code: String,

    /// Effective time window, half-open
    pub range: TimeRange,
}

/// Access to a clinical FHIR server
#[async_trait]
pub trait FhirGateway: Send + Sync {
    /// Whether the server answers at all
    async fn is_reachable(&self) -> bool;

    /// Token endpoint advertised by the server's SMART configuration
    async fn discover_token_endpoint(&self) -> Result<String>;

    /// Exchanges a grant for an access token
    async fn request_token(&self, request: &TokenRequest) -> Result<TokenResponse>;

    /// Observation resources matching the query, across every result page
    async fn search_observations(
        &self,
        token: &SecretString,
        query: &ObservationQuery,
    ) -> Result<Vec<serde_json::Value>>;

    /// Reads one Patient
    async fn read_patient(&self, token: &SecretString, patient_id: &str) -> Result<PatientSummary>;

    /// Submits Observations as one transaction, returning one outcome per entry
    async fn submit_observations(
        &self,
        token: &SecretString,
        observations: &[Observation],
    ) -> Result<Vec<EntryOutcome>>;
}
