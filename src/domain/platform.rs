//! Data source platforms and their per-user configuration

use super::ids::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A source of health measurements
///
/// `SelfTracked` is first-party app data: always enabled, never persisted,
/// and backed by no adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "self")]
    SelfTracked,
    #[serde(rename = "apple_health")]
    AppleHealth,
    #[serde(rename = "google_fit")]
    GoogleFit,
    #[serde(rename = "clinical")]
    Clinical,
}

impl Platform {
    /// Every known platform, `self` first
    pub const ALL: [Platform; 4] = [
        Platform::SelfTracked,
        Platform::AppleHealth,
        Platform::GoogleFit,
        Platform::Clinical,
    ];

    /// Platforms backed by an adapter
    pub const EXTERNAL: [Platform; 3] =
        [Platform::AppleHealth, Platform::GoogleFit, Platform::Clinical];

    /// Stable identifier used in configuration and on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::SelfTracked => "self",
            Platform::AppleHealth => "apple_health",
            Platform::GoogleFit => "google_fit",
            Platform::Clinical => "clinical",
        }
    }

    /// Human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::SelfTracked => "Meridian",
            Platform::AppleHealth => "Apple Health",
            Platform::GoogleFit => "Google Fit",
            Platform::Clinical => "Clinical EHR",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "self" => Ok(Platform::SelfTracked),
            "apple_health" | "apple" | "healthkit" => Ok(Platform::AppleHealth),
            "google_fit" | "google" | "fit" => Ok(Platform::GoogleFit),
            "clinical" | "ehr" | "fhir" => Ok(Platform::Clinical),
            other => Err(format!(
                "Unknown platform '{other}'. Must be one of: self, apple_health, google_fit, clinical"
            )),
        }
    }
}

/// Opaque per-platform settings (e.g. `patient_id` for the clinical source)
pub type SourceSettings = BTreeMap<String, String>;

/// Per-user configuration of one data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Owner of this configuration
    pub user_id: UserId,

    /// Platform this configuration applies to
    pub platform: Platform,

    /// Whether imports from this platform are allowed
    pub enabled: bool,

    /// Completion time of the last import that passed the registry check
    #[serde(default)]
    pub last_sync_date: Option<DateTime<Utc>>,

    /// Platform-specific settings
    #[serde(default)]
    pub settings: SourceSettings,
}

impl SourceConfig {
    /// A disabled configuration with no history
    pub fn new(user_id: UserId, platform: Platform) -> Self {
        Self {
            user_id,
            platform,
            enabled: false,
            last_sync_date: None,
            settings: SourceSettings::new(),
        }
    }

    /// The always-enabled first-party source
    pub fn self_tracked(user_id: UserId) -> Self {
        Self {
            enabled: true,
            ..Self::new(user_id, Platform::SelfTracked)
        }
    }

    /// Marks the configuration enabled
    pub fn enabled(mut self) -> Self {
        self.enabled = true;
        self
    }

    /// Replaces the settings
    pub fn with_settings(mut self, settings: SourceSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the last sync date
    pub fn with_last_sync_date(mut self, date: DateTime<Utc>) -> Self {
        self.last_sync_date = Some(date);
        self
    }
}
