//! Domain error types
//!
//! This module defines the error hierarchy for Meridian. All errors are
//! domain-specific and don't expose third-party types.

use super::metric::MetricKind;
use super::platform::Platform;
use thiserror::Error;

/// Main Meridian error type
///
/// Covers the full interchange taxonomy (availability, permissions, auth,
/// mapping, timeouts, conversion, registry state, persistence) plus the
/// ambient configuration and I/O failures.
#[derive(Debug, Error)]
pub enum MeridianError {
    /// The bridge or platform is not present on this device/deployment
    #[error("Platform unavailable: {0}")]
    Availability(String),

    /// The user declined access to the requested data
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Authentication flow failed or token is invalid
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// No code-table or platform-type mapping exists for the requested kind
    #[error("Unsupported metric '{metric}': {reason}")]
    UnsupportedMetric { metric: String, reason: String },

    /// Write attempted against a read-only platform
    #[error("Unsupported operation on {platform}: {operation}")]
    UnsupportedOperation {
        platform: Platform,
        operation: String,
    },

    /// An I/O suspension point exceeded its configured timeout
    #[error("Operation '{operation}' timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    /// A single record cannot be mapped to or from canonical form
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Operation requested on a platform not enabled in the registry
    #[error("Platform {0} is not enabled for this user")]
    PlatformDisabled(Platform),

    /// Configuration store failure
    #[error("Configuration store error: {0}")]
    ConfigStore(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// FHIR gateway transport errors
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),
}

impl MeridianError {
    /// Shorthand for a kind missing from the canonical vocabulary table
    pub fn unsupported_metric(metric: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedMetric {
            metric: metric.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a kind with no identifier on the given platform
    pub fn unmapped_metric(metric: MetricKind, platform: Platform) -> Self {
        Self::UnsupportedMetric {
            metric: metric.to_string(),
            reason: format!("no {platform} data type mapping"),
        }
    }

    /// Whether retrying the same call later could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            MeridianError::Timeout { .. } | MeridianError::Availability(_) => true,
            MeridianError::Gateway(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// FHIR gateway transport errors
///
/// Errors that occur when talking HTTP to a clinical FHIR server. These errors
/// don't expose the HTTP client's types.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Failed to reach the server
    #[error("Failed to connect to FHIR server: {0}")]
    ConnectionFailed(String),

    /// Invalid response body
    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Server error (5xx)
    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    /// Client error (4xx)
    #[error("Client error: {status} - {message}")]
    ClientError { status: u16, message: String },
}

impl GatewayError {
    /// Connection failures and 5xx responses are worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::ConnectionFailed(_) | GatewayError::ServerError { .. }
        )
    }
}

impl From<std::io::Error> for MeridianError {
    fn from(err: std::io::Error) -> Self {
        MeridianError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for MeridianError {
    fn from(err: serde_json::Error) -> Self {
        MeridianError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for MeridianError {
    fn from(err: toml::de::Error) -> Self {
        MeridianError::Configuration(format!("TOML parse error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MeridianError::PlatformDisabled(Platform::GoogleFit);
        assert_eq!(
            err.to_string(),
            "Platform google_fit is not enabled for this user"
        );

        let err = MeridianError::Timeout {
            operation: "query_records".to_string(),
            seconds: 30,
        };
        assert_eq!(
            err.to_string(),
            "Operation 'query_records' timed out after 30s"
        );
    }

    #[test]
    fn test_unmapped_metric_names_platform() {
        let err = MeridianError::unmapped_metric(MetricKind::ActiveEnergy, Platform::Clinical);
        assert!(matches!(err, MeridianError::UnsupportedMetric { .. }));
        assert!(err.to_string().contains("active_energy"));
        assert!(err.to_string().contains("clinical"));
    }

    #[test]
    fn test_gateway_error_conversion() {
        let gateway_err = GatewayError::ConnectionFailed("refused".to_string());
        let err: MeridianError = gateway_err.into();
        assert!(matches!(err, MeridianError::Gateway(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(MeridianError::Availability("bridge".to_string()).is_retryable());
        assert!(!MeridianError::PermissionDenied("no".to_string()).is_retryable());
        assert!(!MeridianError::Gateway(GatewayError::ClientError {
            status: 400,
            message: "bad".to_string()
        })
        .is_retryable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: MeridianError = io_err.into();
        assert!(matches!(err, MeridianError::Io(_)));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: MeridianError = json_err.into();
        assert!(matches!(err, MeridianError::Serialization(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: MeridianError = toml_err.into();
        assert!(matches!(err, MeridianError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }
}
