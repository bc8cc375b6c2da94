//! FHIR REST API models
//!
//! Request and response structures exchanged with the clinical FHIR server and
//! its OAuth2 token endpoint. These are wire shapes only and stay separate from
//! the canonical domain model; parsing of server Observations is lenient, so a
//! resource that lacks optional elements still deserializes and fails later,
//! per item, during conversion.

use crate::config::SecretString;
use crate::domain::{MeridianError, Result};
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

/// OAuth2 grant used to obtain an access token
#[derive(Debug, Clone)]
pub enum TokenGrant {
    /// Resource owner password grant
    Password {
        client_id: String,
        username: String,
        password: SecretString,
    },
    /// Client credentials grant (also used by SMART backend services)
    ClientCredentials {
        client_id: String,
        client_secret: SecretString,
    },
}

impl TokenGrant {
    pub fn grant_type(&self) -> &'static str {
        match self {
            TokenGrant::Password { .. } => "password",
            TokenGrant::ClientCredentials { .. } => "client_credentials",
        }
    }
}

/// A token request against a resolved token endpoint
#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub token_url: String,
    pub grant: TokenGrant,
    pub scope: Option<String>,
}

impl TokenRequest {
    /// Form body for `application/x-www-form-urlencoded` submission
    ///
    /// Exposes the grant's secrets; the result must not be logged.
    pub fn form(&self) -> Vec<(&'static str, String)> {
        let mut form = vec![("grant_type", self.grant.grant_type().to_string())];
        match &self.grant {
            TokenGrant::Password {
                client_id,
                username,
                password,
            } => {
                form.push(("client_id", client_id.clone()));
                form.push(("username", username.clone()));
                form.push(("password", password.expose_secret().as_str().to_string()));
            }
            TokenGrant::ClientCredentials {
                client_id,
                client_secret,
            } => {
                form.push(("client_id", client_id.clone()));
                form.push((
                    "client_secret",
                    client_secret.expose_secret().as_str().to_string(),
                ));
            }
        }
        if let Some(scope) = &self.scope {
            form.push(("scope", scope.clone()));
        }
        form
    }
}

/// Token endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: SecretString,

    /// Lifetime in seconds; the configured fallback applies when absent
    #[serde(default)]
    pub expires_in: Option<u64>,

    #[serde(default)]
    pub token_type: Option<String>,
}

/// Subset of `/.well-known/smart-configuration`
#[derive(Debug, Clone, Deserialize)]
pub struct SmartConfiguration {
    pub token_endpoint: String,
}

/// Bundle returned by searches and transactions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    #[serde(default)]
    pub resource_type: String,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub bundle_type: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub link: Vec<BundleLink>,

    #[serde(default)]
    pub entry: Vec<BundleEntry>,
}

impl Bundle {
    /// URL of the next search page, if any
    pub fn next_link(&self) -> Option<&str> {
        self.link
            .iter()
            .find(|l| l.relation == "next")
            .map(|l| l.url.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleLink {
    pub relation: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<BundleEntryRequest>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<EntryOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleEntryRequest {
    pub method: String,
    pub url: String,
}

/// Per-entry result of a transaction Bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryOutcome {
    /// HTTP status line, e.g. `201 Created`
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl EntryOutcome {
    pub fn is_success(&self) -> bool {
        self.status.trim_start().starts_with('2')
    }
}

/// Demographics read from a Patient resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientSummary {
    pub id: String,
    pub name: Option<String>,
    pub birth_date: Option<String>,
    pub gender: Option<String>,
}

impl PatientSummary {
    /// Extracts the summary from a raw Patient resource
    ///
    /// # Errors
    ///
    /// Returns `Conversion` when the resource is not a Patient or has no id.
    pub fn from_resource(resource: &serde_json::Value) -> Result<Self> {
        let resource_type = resource.get("resourceType").and_then(|v| v.as_str());
        if resource_type != Some("Patient") {
            return Err(MeridianError::Conversion(format!(
                "expected a Patient resource, got {}",
                resource_type.unwrap_or("nothing")
            )));
        }
        let id = resource
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| MeridianError::Conversion("Patient resource has no id".to_string()))?;

        let name = resource
            .get("name")
            .and_then(|n| n.as_array())
            .and_then(|names| names.first())
            .and_then(human_name);

        Ok(Self {
            id: id.to_string(),
            name,
            birth_date: string_field(resource, "birthDate"),
            gender: string_field(resource, "gender"),
        })
    }
}

fn string_field(resource: &serde_json::Value, field: &str) -> Option<String> {
    resource
        .get(field)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

fn human_name(name: &serde_json::Value) -> Option<String> {
    if let Some(text) = name.get("text").and_then(|t| t.as_str()) {
        return Some(text.to_string());
    }
    let mut parts: Vec<&str> = name
        .get("given")
        .and_then(|g| g.as_array())
        .map(|given| given.iter().filter_map(|g| g.as_str()).collect())
        .unwrap_or_default();
    if let Some(family) = name.get("family").and_then(|f| f.as_str()) {
        parts.push(family);
    }
    (!parts.is_empty()).then(|| parts.join(" "))
}

/// Observation as served by a FHIR server, read leniently
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FhirObservation {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub code: Option<FhirCodeableConcept>,

    #[serde(default)]
    pub effective_date_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub value_quantity: Option<FhirQuantity>,

    #[serde(default)]
    pub device: Option<FhirReference>,
}

impl FhirObservation {
    /// Codings of the Observation's code, empty when absent
    pub fn codings(&self) -> &[FhirCoding] {
        self.code
            .as_ref()
            .map(|c| c.coding.as_slice())
            .unwrap_or(&[])
    }

    /// Short label used in failure reports
    pub fn label(&self) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| "Observation/<no id>".to_string())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FhirCodeableConcept {
    #[serde(default)]
    pub coding: Vec<FhirCoding>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FhirCoding {
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FhirQuantity {
    pub value: f64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FhirReference {
    pub reference: String,
}
