//! Domain identifier types with validation
//!
//! Newtype wrappers for the identifiers that flow through the interchange
//! engine, so a user id can never be passed where a device id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Application user identifier
///
/// Used as the subject of every canonical Observation (`Patient/{user_id}`)
/// and as the key of the per-user source registry. The id is embedded in
/// references and store file names, so path and reference separators are
/// rejected.
///
/// # Examples
///
/// ```
/// use meridian::domain::ids::UserId;
/// use std::str::FromStr;
///
/// let user = UserId::from_str("user-1").unwrap();
/// assert_eq!(user.patient_reference(), "Patient/user-1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Creates a new UserId from a string
    ///
    /// # Returns
    ///
    /// Returns `Ok(UserId)` if the ID is valid, `Err` otherwise
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("User ID cannot be empty".to_string());
        }
        if id.contains(['/', '\\']) || id.contains("..") {
            return Err(format!("User ID contains a forbidden character: {id}"));
        }
        Ok(Self(id))
    }

    /// Returns the user ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }

    /// FHIR subject reference for this user
    pub fn patient_reference(&self) -> String {
        format!("Patient/{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Recording device identifier
///
/// Wearable samples carry the originating device, which is kept on the
/// Observation as `Device/{device_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Creates a new DeviceId from a string
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Device ID cannot be empty".to_string());
        }
        Ok(Self(id))
    }

    /// Returns the device ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// FHIR device reference
    pub fn device_reference(&self) -> String {
        format!("Device/{}", self.0)
    }

    /// Parses a `Device/{id}` reference back into an id
    pub fn from_reference(reference: &str) -> Option<Self> {
        reference
            .strip_prefix("Device/")
            .and_then(|id| Self::new(id).ok())
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeviceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_creation() {
        let id = UserId::new("user-1").unwrap();
        assert_eq!(id.as_str(), "user-1");
        assert_eq!(id.patient_reference(), "Patient/user-1");
    }

    #[test]
    fn test_user_id_empty_fails() {
        assert!(UserId::new("").is_err());
        assert!(UserId::new("   ").is_err());
    }

    #[test]
    fn test_user_id_rejects_separators() {
        assert!(UserId::new("a/b").is_err());
        assert!(UserId::new("..").is_err());
        assert!(UserId::new("c:\\x").is_err());
    }

    #[test]
    fn test_user_id_from_str() {
        let id: UserId = "abc".parse().unwrap();
        assert_eq!(format!("{id}"), "abc");
    }

    #[test]
    fn test_device_reference_round_trip() {
        let device = DeviceId::new("watch-7").unwrap();
        assert_eq!(device.device_reference(), "Device/watch-7");
        assert_eq!(DeviceId::from_reference("Device/watch-7"), Some(device));
        assert_eq!(DeviceId::from_reference("Patient/watch-7"), None);
    }

    #[test]
    fn test_user_id_serialization() {
        let id = UserId::new("user-1").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"user-1\"");
        let deserialized: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }
}
