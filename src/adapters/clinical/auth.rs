//! Clinical session management
//!
//! Tracks the OAuth2 access token through
//! `Unauthenticated -> Authenticating -> Authenticated(expiry) -> Unauthenticated`.
//! Re-authentication is single flight: concurrent callers that find the
//! session missing or expired queue behind one token request and reuse its
//! result, whether that is a session or an authentication error.

use super::gateway::FhirGateway;
use super::models::{TokenGrant, TokenRequest};
use crate::config::{AuthMethod, ClinicalConfig, SecretString};
use crate::domain::{MeridianError, Result};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Credentials and flow used to obtain tokens
#[derive(Debug, Clone)]
pub struct Credentials {
    method: AuthMethod,
    token_url: Option<String>,
    client_id: String,
    client_secret: Option<SecretString>,
    username: Option<String>,
    password: Option<SecretString>,
    scope: Option<String>,
    default_lifetime: Duration,
}

impl Credentials {
    /// OAuth2 password grant against a known token endpoint
    pub fn password(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        username: impl Into<String>,
        password: SecretString,
    ) -> Self {
        Self {
            method: AuthMethod::Password,
            token_url: Some(token_url.into()),
            client_id: client_id.into(),
            client_secret: None,
            username: Some(username.into()),
            password: Some(password),
            scope: None,
            default_lifetime: Duration::from_secs(3600),
        }
    }

    /// OAuth2 client credentials grant against a known token endpoint
    pub fn client_credentials(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecretString,
    ) -> Self {
        Self {
            method: AuthMethod::ClientCredentials,
            token_url: Some(token_url.into()),
            client_id: client_id.into(),
            client_secret: Some(client_secret),
            username: None,
            password: None,
            scope: None,
            default_lifetime: Duration::from_secs(3600),
        }
    }

    /// SMART backend services; the token endpoint is discovered on first use
    pub fn smart(client_id: impl Into<String>, client_secret: SecretString) -> Self {
        Self {
            method: AuthMethod::Smart,
            token_url: None,
            client_id: client_id.into(),
            client_secret: Some(client_secret),
            username: None,
            password: None,
            scope: None,
            default_lifetime: Duration::from_secs(3600),
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Lifetime assumed when the token response carries no `expires_in`
    pub fn with_default_lifetime(mut self, lifetime: Duration) -> Self {
        self.default_lifetime = lifetime;
        self
    }

    /// Builds credentials from the `[clinical]` section
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when the section lacks what its auth method needs.
    pub fn from_config(config: &ClinicalConfig) -> Result<Self> {
        let client_id = config.client_id.clone().ok_or_else(|| {
            MeridianError::Configuration("clinical.client_id is required".to_string())
        })?;
        let credentials = Self {
            method: config.auth_method,
            token_url: config.token_url.clone(),
            client_id,
            client_secret: config.client_secret.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            scope: config.scope.clone(),
            default_lifetime: Duration::from_secs(config.default_token_lifetime_secs),
        };
        credentials.grant()?;
        Ok(credentials)
    }

    pub fn method(&self) -> AuthMethod {
        self.method
    }

    fn grant(&self) -> Result<TokenGrant> {
        let missing = |field: &str| {
            MeridianError::Configuration(format!(
                "clinical.{field} is required when auth_method is '{}'",
                self.method
            ))
        };
        match self.method {
            AuthMethod::Password => Ok(TokenGrant::Password {
                client_id: self.client_id.clone(),
                username: self.username.clone().ok_or_else(|| missing("username"))?,
                password: self.password.clone().ok_or_else(|| missing("password"))?,
            }),
            AuthMethod::ClientCredentials | AuthMethod::Smart => {
                Ok(TokenGrant::ClientCredentials {
                    client_id: self.client_id.clone(),
                    client_secret: self
                        .client_secret
                        .clone()
                        .ok_or_else(|| missing("client_secret"))?,
                })
            }
        }
    }
}

/// A valid access token and when it stops being valid
#[derive(Debug, Clone)]
pub struct AuthSession {
    access_token: SecretString,
    expiry: Instant,
    expires_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    /// Wall-clock expiry, for display
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_valid(&self) -> bool {
        Instant::now() < self.expiry
    }
}

/// Observable authentication state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticating,
    Authenticated { expires_at: DateTime<Utc> },
}

#[derive(Debug)]
enum SessionState {
    Unauthenticated,
    Authenticating,
    Authenticated(AuthSession),
}

/// Outcome of the most recent finished token request
#[derive(Debug, Default)]
struct LastAttempt {
    failure: Option<String>,
}

/// Owns the clinical session and serializes token requests
pub struct SessionManager {
    gateway: Arc<dyn FhirGateway>,
    credentials: Credentials,
    state: Mutex<SessionState>,
    flight: tokio::sync::Mutex<LastAttempt>,
    /// Finished token requests; read outside the flight lock
    attempts: AtomicU64,
}

/// Drops an abandoned `Authenticating` state back to `Unauthenticated`
struct AttemptGuard<'a> {
    manager: &'a SessionManager,
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.manager.lock_state();
        if matches!(*state, SessionState::Authenticating) {
            *state = SessionState::Unauthenticated;
        }
    }
}

impl SessionManager {
    pub fn new(gateway: Arc<dyn FhirGateway>, credentials: Credentials) -> Self {
        Self {
            gateway,
            credentials,
            state: Mutex::new(SessionState::Unauthenticated),
            flight: tokio::sync::Mutex::new(LastAttempt::default()),
            attempts: AtomicU64::new(0),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current session if it has not expired; an expired one is dropped
    fn current(&self) -> Option<AuthSession> {
        let mut state = self.lock_state();
        match &*state {
            SessionState::Authenticated(session) if session.is_valid() => Some(session.clone()),
            SessionState::Authenticated(_) => {
                tracing::debug!("Clinical access token expired");
                *state = SessionState::Unauthenticated;
                None
            }
            _ => None,
        }
    }

    pub fn state(&self) -> AuthState {
        match &*self.lock_state() {
            SessionState::Unauthenticated => AuthState::Unauthenticated,
            SessionState::Authenticating => AuthState::Authenticating,
            SessionState::Authenticated(session) if session.is_valid() => {
                AuthState::Authenticated {
                    expires_at: session.expires_at,
                }
            }
            SessionState::Authenticated(_) => AuthState::Unauthenticated,
        }
    }

    /// Drops the current session
    pub fn invalidate(&self) {
        *self.lock_state() = SessionState::Unauthenticated;
    }

    /// Returns the valid session, authenticating first when there is none
    ///
    /// Callers that queued behind a failed token request get its error
    /// instead of issuing another request.
    pub async fn ensure_authenticated(&self) -> Result<AuthSession> {
        let seen = self.attempts.load(Ordering::SeqCst);
        if let Some(session) = self.current() {
            return Ok(session);
        }
        let mut flight = self.flight.lock().await;
        // Another caller may have finished while we queued
        if let Some(session) = self.current() {
            return Ok(session);
        }
        if self.attempts.load(Ordering::SeqCst) != seen {
            if let Some(message) = &flight.failure {
                tracing::debug!("Reusing failed clinical authentication attempt");
                return Err(MeridianError::Authentication(message.clone()));
            }
        }
        self.attempt(&mut flight).await
    }

    /// Requests a fresh token regardless of the current session
    pub async fn authenticate(&self) -> Result<AuthSession> {
        let mut flight = self.flight.lock().await;
        self.attempt(&mut flight).await
    }

    /// Runs one token request and records its outcome for queued callers
    async fn attempt(&self, last: &mut LastAttempt) -> Result<AuthSession> {
        let result = self.run_flow().await;
        last.failure = match &result {
            Ok(_) => None,
            Err(MeridianError::Authentication(message)) => Some(message.clone()),
            Err(other) => Some(other.to_string()),
        };
        self.attempts.fetch_add(1, Ordering::SeqCst);
        result
    }

    /// Caller must hold the flight lock
    async fn run_flow(&self) -> Result<AuthSession> {
        *self.lock_state() = SessionState::Authenticating;
        let _guard = AttemptGuard { manager: self };

        match self.request_session().await {
            Ok(session) => {
                tracing::info!(
                    method = %self.credentials.method,
                    expires_at = %session.expires_at,
                    "Authenticated with clinical FHIR server"
                );
                *self.lock_state() = SessionState::Authenticated(session.clone());
                Ok(session)
            }
            Err(e) => {
                tracing::error!(
                    method = %self.credentials.method,
                    error = %e,
                    "Clinical authentication failed"
                );
                *self.lock_state() = SessionState::Unauthenticated;
                Err(match e {
                    MeridianError::Authentication(_) => e,
                    other => MeridianError::Authentication(other.to_string()),
                })
            }
        }
    }

    async fn request_session(&self) -> Result<AuthSession> {
        let token_url = match (&self.credentials.token_url, self.credentials.method) {
            (Some(url), _) => url.clone(),
            (None, AuthMethod::Smart) => self.gateway.discover_token_endpoint().await?,
            (None, method) => {
                return Err(MeridianError::Configuration(format!(
                    "clinical.token_url is required when auth_method is '{method}'"
                )))
            }
        };

        let request = TokenRequest {
            token_url,
            grant: self.credentials.grant()?,
            scope: self.credentials.scope.clone(),
        };
        let response = self.gateway.request_token(&request).await?;

        let lifetime = response
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(self.credentials.default_lifetime);
        let expires_at = Utc::now()
            + chrono::Duration::from_std(lifetime).unwrap_or_else(|_| chrono::Duration::zero());

        Ok(AuthSession {
            access_token: response.access_token,
            expiry: Instant::now() + lifetime,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;

    #[test]
    fn test_password_credentials_need_username() {
        let config = ClinicalConfig {
            base_url: "https://fhir.example.org".to_string(),
            auth_method: AuthMethod::Password,
            token_url: Some("https://auth.example.org/token".to_string()),
            client_id: Some("meridian".to_string()),
            client_secret: None,
            username: None,
            password: Some(secret_string("pw".to_string())),
            scope: None,
            default_token_lifetime_secs: 3600,
            tls_verify: true,
            timeout_seconds: 30,
            page_size: 100,
            retry: Default::default(),
        };
        let err = Credentials::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("username"));
    }

    #[test]
    fn test_smart_grant_is_client_credentials() {
        let credentials = Credentials::smart("meridian", secret_string("s".to_string()));
        assert_eq!(credentials.grant().unwrap().grant_type(), "client_credentials");
    }
}
