//! FHIR REST gateway over reqwest
//!
//! Talks to a FHIR R4 server: capability probe, SMART configuration discovery,
//! OAuth2 token requests, paginated Observation search, Patient read and
//! transaction Bundle submission. Transport failures and 5xx responses are
//! retried with exponential backoff; everything else fails immediately.

use super::gateway::{FhirGateway, ObservationQuery};
use super::models::{
    Bundle, BundleEntry, BundleEntryRequest, EntryOutcome, PatientSummary, SmartConfiguration,
    TokenRequest, TokenResponse,
};
use crate::config::{ClinicalConfig, RetryConfig, SecretString};
use crate::domain::{GatewayError, MeridianError, Observation, Result};
use crate::log_retry_attempt;
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::{Client, ClientBuilder, RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

const FHIR_JSON: &str = "application/fhir+json";

/// Upper bound on followed `next` links for one search
const MAX_SEARCH_PAGES: usize = 500;

/// HTTP implementation of [`FhirGateway`]
pub struct FhirGatewayClient {
    base_url: Url,
    client: Client,
    retry: RetryConfig,
    page_size: usize,
}

impl FhirGatewayClient {
    /// Creates a client for the configured FHIR server
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when the base URL does not parse or the HTTP
    /// client cannot be built.
    pub fn new(config: &ClinicalConfig) -> Result<Self> {
        // Url::join drops the last path segment unless the base ends in '/'
        let mut base = config.base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base).map_err(|e| {
            MeridianError::Configuration(format!(
                "invalid clinical.base_url '{}': {e}",
                config.base_url
            ))
        })?;

        let mut builder = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(30));

        if !config.tls_verify {
            tracing::warn!(
                base_url = %config.base_url,
                "TLS certificate verification is disabled for the clinical gateway"
            );
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(|e| {
            MeridianError::Configuration(format!("failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            base_url,
            client,
            retry: config.retry.clone(),
            page_size: config.page_size,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(|e| {
            GatewayError::InvalidResponse(format!("cannot build URL for '{path}': {e}")).into()
        })
    }

    /// Retry a request with exponential backoff
    async fn retry_request<F, T, Fut>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let max_retries = self.retry.max_retries.max(1);
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    attempt += 1;
                    if !e.is_retryable() || attempt >= max_retries {
                        return Err(e);
                    }
                    log_retry_attempt!(attempt, max_retries, e);
                    tokio::time::sleep(self.retry.delay_for(attempt)).await;
                }
            }
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::ConnectionFailed(e.to_string()))?;
        check_status(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, token: &SecretString) -> Result<T> {
        self.retry_request(|| async {
            let response = self
                .send(
                    self.client
                        .get(url.clone())
                        .bearer_auth(token.expose_secret().as_str())
                        .header(reqwest::header::ACCEPT, FHIR_JSON),
                )
                .await?;
            decode(response).await
        })
        .await
    }

    fn search_url(&self, query: &ObservationQuery) -> Result<Url> {
        let mut url = self.endpoint("Observation")?;
        url.query_pairs_mut()
            .append_pair("patient", &query.patient_id)
            .append_pair(
                "code",
                &format!("{}|{}", crate::domain::LOINC_SYSTEM, query.code),
            )
            .append_pair(
                "date",
                &format!(
                    "ge{}",
                    query.range.start.to_rfc3339_opts(SecondsFormat::Secs, true)
                ),
            )
            .append_pair(
                "date",
                &format!(
                    "lt{}",
                    query.range.end.to_rfc3339_opts(SecondsFormat::Secs, true)
                ),
            )
            .append_pair("_count", &self.page_size.to_string());
        Ok(url)
    }
}

/// Maps non-success statuses onto gateway errors
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => MeridianError::Authentication(
            format!("FHIR server rejected credentials with status {status}"),
        ),
        StatusCode::NOT_FOUND => GatewayError::NotFound(body).into(),
        s if s.is_server_error() => GatewayError::ServerError {
            status: s.as_u16(),
            message: body,
        }
        .into(),
        s => GatewayError::ClientError {
            status: s.as_u16(),
            message: body,
        }
        .into(),
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| GatewayError::InvalidResponse(e.to_string()).into())
}

fn is_observation(resource: &serde_json::Value) -> bool {
    resource.get("resourceType").and_then(|v| v.as_str()) == Some("Observation")
}

#[async_trait]
impl FhirGateway for FhirGatewayClient {
    async fn is_reachable(&self) -> bool {
        let Ok(url) = self.endpoint("metadata") else {
            return false;
        };
        match self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, FHIR_JSON)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "FHIR capability probe failed");
                false
            }
        }
    }

    async fn discover_token_endpoint(&self) -> Result<String> {
        let url = self.endpoint(".well-known/smart-configuration")?;
        let config: SmartConfiguration = self
            .retry_request(|| async {
                let response = self
                    .send(
                        self.client
                            .get(url.clone())
                            .header(reqwest::header::ACCEPT, "application/json"),
                    )
                    .await?;
                decode(response).await
            })
            .await?;
        tracing::debug!(token_endpoint = %config.token_endpoint, "Discovered SMART token endpoint");
        Ok(config.token_endpoint)
    }

    async fn request_token(&self, request: &TokenRequest) -> Result<TokenResponse> {
        let url = Url::parse(&request.token_url).map_err(|e| {
            MeridianError::Configuration(format!(
                "invalid token endpoint '{}': {e}",
                request.token_url
            ))
        })?;
        let form = request.form();

        self.retry_request(|| async {
            let response = self
                .client
                .post(url.clone())
                .header(reqwest::header::ACCEPT, "application/json")
                .form(&form)
                .send()
                .await
                .map_err(|e| GatewayError::ConnectionFailed(e.to_string()))?;

            let status = response.status();
            if status.is_client_error() {
                let body = response.text().await.unwrap_or_default();
                return Err(MeridianError::Authentication(format!(
                    "token request rejected with status {status}: {body}"
                )));
            }
            decode(check_status(response).await?).await
        })
        .await
    }

    async fn search_observations(
        &self,
        token: &SecretString,
        query: &ObservationQuery,
    ) -> Result<Vec<serde_json::Value>> {
        let mut url = self.search_url(query)?;
        let mut resources = Vec::new();
        let mut pages = 0;

        loop {
            let bundle: Bundle = self.get_json(url, token).await?;
            pages += 1;
            resources.extend(
                bundle
                    .entry
                    .iter()
                    .filter_map(|e| e.resource.clone())
                    .filter(is_observation),
            );

            let Some(next) = bundle.next_link() else {
                break;
            };
            if pages >= MAX_SEARCH_PAGES {
                tracing::warn!(
                    pages = pages,
                    code = %query.code,
                    "Stopping Observation search at the page limit"
                );
                break;
            }
            url = self.base_url.join(next).map_err(|e| {
                GatewayError::InvalidResponse(format!("bad next link '{next}': {e}"))
            })?;
        }

        tracing::debug!(
            code = %query.code,
            pages = pages,
            resources = resources.len(),
            "Observation search complete"
        );
        Ok(resources)
    }

    async fn read_patient(&self, token: &SecretString, patient_id: &str) -> Result<PatientSummary> {
        let url = self.endpoint(&format!("Patient/{patient_id}"))?;
        let resource: serde_json::Value = self.get_json(url, token).await?;
        PatientSummary::from_resource(&resource)
    }

    async fn submit_observations(
        &self,
        token: &SecretString,
        observations: &[Observation],
    ) -> Result<Vec<EntryOutcome>> {
        let entry = observations
            .iter()
            .map(|o| -> Result<BundleEntry> {
                Ok(BundleEntry {
                    resource: Some(serde_json::to_value(o)?),
                    request: Some(BundleEntryRequest {
                        method: "POST".to_string(),
                        url: "Observation".to_string(),
                    }),
                    response: None,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let bundle = Bundle {
            resource_type: "Bundle".to_string(),
            bundle_type: Some("transaction".to_string()),
            link: Vec::new(),
            entry,
        };
        let body = serde_json::to_vec(&bundle)?;
        let url = self.base_url.clone();

        let reply: Bundle = self
            .retry_request(|| async {
                let response = self
                    .send(
                        self.client
                            .post(url.clone())
                            .bearer_auth(token.expose_secret().as_str())
                            .header(reqwest::header::CONTENT_TYPE, FHIR_JSON)
                            .header(reqwest::header::ACCEPT, FHIR_JSON)
                            .body(body.clone()),
                    )
                    .await?;
                decode(response).await
            })
            .await?;

        let outcomes: Vec<EntryOutcome> = reply
            .entry
            .into_iter()
            .filter_map(|e| e.response)
            .collect();
        if outcomes.len() != observations.len() {
            return Err(GatewayError::InvalidResponse(format!(
                "transaction response has {} entries for {} submitted",
                outcomes.len(),
                observations.len()
            ))
            .into());
        }
        Ok(outcomes)
    }
}
