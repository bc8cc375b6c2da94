//! Clinical FHIR integration
//!
//! Reads and writes Observations on a FHIR R4 server reached through an
//! injectable [`FhirGateway`]. The production gateway is [`FhirGatewayClient`];
//! authentication uses OAuth2 password or client-credentials grants, or SMART
//! backend services with token endpoint discovery.

pub mod adapter;
pub mod auth;
pub mod client;
pub mod gateway;
pub mod models;

pub use adapter::{ClinicalAdapter, PATIENT_ID_SETTING};
pub use auth::{AuthSession, AuthState, Credentials, SessionManager};
pub use client::FhirGatewayClient;
pub use gateway::{FhirGateway, ObservationQuery};
pub use models::{EntryOutcome, PatientSummary, TokenGrant, TokenRequest, TokenResponse};
