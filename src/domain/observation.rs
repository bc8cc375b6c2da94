//! Canonical Observation model
//!
//! The normalized, platform-independent representation of one health
//! measurement, patterned on the FHIR R4 Observation resource. Observations are
//! immutable once built: fields are private and only readable through
//! accessors, and the only way to create one is [`ObservationBuilder`], which
//! enforces the vocabulary table, the canonical unit and the mandatory subject.

use super::errors::MeridianError;
use super::ids::{DeviceId, UserId};
use super::metric::{MetricKind, OBSERVATION_CATEGORY_SYSTEM, UCUM_SYSTEM};
use super::result::Result;
use super::units::Unit;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed resource type of every canonical Observation
pub const RESOURCE_TYPE: &str = "Observation";

/// Extension URL carrying the non-canonical unit a value was originally reported in
pub const ORIGINAL_UNIT_EXTENSION_URL: &str =
    "https://meridian.health/fhir/StructureDefinition/original-unit";

/// Observation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationStatus {
    Registered,
    Preliminary,
    Final,
    Amended,
}

/// A `{system, code, display}` triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coding {
    pub system: String,
    pub code: String,
    pub display: String,
}

/// A set of codings plus optional free text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeableConcept {
    pub coding: Vec<Coding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Reference to another resource (`Patient/..`, `Device/..`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub reference: String,
}

/// Measured amount with UCUM unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    pub unit: String,
    pub system: String,
    pub code: String,
}

impl Quantity {
    /// Quantity expressed in the given unit
    pub fn new(value: f64, unit: Unit) -> Self {
        Self {
            value,
            unit: unit.display().to_string(),
            system: UCUM_SYSTEM.to_string(),
            code: unit.ucum_code().to_string(),
        }
    }
}

/// Extension element (`{url, valueString}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extension {
    pub url: String,
    pub value_string: String,
}

/// The single populated value slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObservationValue {
    #[serde(rename = "valueQuantity")]
    Quantity(Quantity),
    #[serde(rename = "valueString")]
    String(String),
    #[serde(rename = "valueBoolean")]
    Boolean(bool),
    #[serde(rename = "valueInteger")]
    Integer(i64),
}

/// Canonical Observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    resource_type: String,
    id: String,
    status: ObservationStatus,
    category: Vec<CodeableConcept>,
    code: CodeableConcept,
    subject: Reference,
    effective_date_time: DateTime<Utc>,
    issued: DateTime<Utc>,
    #[serde(flatten)]
    value: ObservationValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    device: Option<Reference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    extension: Vec<Extension>,
}

impl Observation {
    /// Starts building an Observation of the given kind
    pub fn builder(kind: MetricKind) -> ObservationBuilder {
        ObservationBuilder::new(kind)
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> ObservationStatus {
        self.status
    }

    pub fn category(&self) -> &[CodeableConcept] {
        &self.category
    }

    pub fn code(&self) -> &CodeableConcept {
        &self.code
    }

    pub fn subject(&self) -> &Reference {
        &self.subject
    }

    pub fn effective_date_time(&self) -> DateTime<Utc> {
        self.effective_date_time
    }

    pub fn issued(&self) -> DateTime<Utc> {
        self.issued
    }

    pub fn value(&self) -> &ObservationValue {
        &self.value
    }

    pub fn device(&self) -> Option<&Reference> {
        self.device.as_ref()
    }

    pub fn extension(&self) -> &[Extension] {
        &self.extension
    }

    /// The quantity value, if that is the populated slot
    pub fn quantity(&self) -> Option<&Quantity> {
        match &self.value {
            ObservationValue::Quantity(q) => Some(q),
            _ => None,
        }
    }

    /// Primary coding of the observed concept
    pub fn primary_coding(&self) -> Option<&Coding> {
        self.code.coding.first()
    }

    /// Metric kind resolved through the vocabulary table
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedMetric` when the code is not in the table.
    pub fn metric_kind(&self) -> Result<MetricKind> {
        let coding = self.primary_coding().ok_or_else(|| {
            MeridianError::Conversion(format!("observation {} has no coding", self.id))
        })?;
        MetricKind::from_code(&coding.system, &coding.code)
    }

    /// User id extracted from the `Patient/{id}` subject reference
    pub fn subject_user(&self) -> Option<&str> {
        self.subject.reference.strip_prefix("Patient/")
    }

    /// Device id extracted from the device reference
    pub fn device_id(&self) -> Option<DeviceId> {
        self.device
            .as_ref()
            .and_then(|d| DeviceId::from_reference(&d.reference))
    }

    /// Unit the value was originally reported in, when it was not canonical
    pub fn original_unit(&self) -> Option<&str> {
        self.extension
            .iter()
            .find(|e| e.url == ORIGINAL_UNIT_EXTENSION_URL)
            .map(|e| e.value_string.as_str())
    }

    /// Content identity ignoring `id` and `issued`
    ///
    /// Two imports of the same source data produce Observations with equal
    /// fingerprints.
    pub fn fingerprint(&self) -> String {
        let code = self
            .primary_coding()
            .map(|c| format!("{}|{}", c.system, c.code))
            .unwrap_or_default();
        let value = match &self.value {
            ObservationValue::Quantity(q) => format!("q:{:.6}{}", q.value, q.code),
            ObservationValue::String(s) => format!("s:{s}"),
            ObservationValue::Boolean(b) => format!("b:{b}"),
            ObservationValue::Integer(i) => format!("i:{i}"),
        };
        format!(
            "{}|{}|{}|{}|{}|{}",
            self.subject.reference,
            code,
            self.effective_date_time.to_rfc3339(),
            value,
            self.device
                .as_ref()
                .map(|d| d.reference.as_str())
                .unwrap_or("-"),
            self.original_unit().unwrap_or("-"),
        )
    }

    /// Checks the canonical invariants on an Observation that arrived from
    /// outside the builder (e.g. deserialized)
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a wrong resource type, a missing subject or a
    /// quantity outside the canonical unit, and `UnsupportedMetric` for a code
    /// outside the vocabulary table.
    pub fn validate(&self) -> Result<()> {
        if self.resource_type != RESOURCE_TYPE {
            return Err(MeridianError::Validation(format!(
                "resourceType must be '{RESOURCE_TYPE}', got '{}'",
                self.resource_type
            )));
        }
        match self.subject_user() {
            Some(user) if !user.trim().is_empty() => {}
            _ => {
                return Err(MeridianError::Validation(format!(
                    "subject.reference must be Patient/{{userId}}, got '{}'",
                    self.subject.reference
                )))
            }
        }
        let entry = self.metric_kind()?.code_entry()?;
        if let Some(q) = self.quantity() {
            if q.code != entry.unit.ucum_code() {
                return Err(MeridianError::Validation(format!(
                    "{} must be stored in {}, got {}",
                    entry.kind,
                    entry.unit.ucum_code(),
                    q.code
                )));
            }
        }
        Ok(())
    }
}

/// Builder for canonical Observations
///
/// Code, category and quantity unit come from the vocabulary table; callers
/// only supply subject, time and the value already in canonical units.
#[derive(Debug)]
pub struct ObservationBuilder {
    kind: MetricKind,
    id: Option<String>,
    status: ObservationStatus,
    subject: Option<UserId>,
    effective: Option<DateTime<Utc>>,
    issued: Option<DateTime<Utc>>,
    value: Option<ObservationValue>,
    canonical_value: Option<f64>,
    device: Option<DeviceId>,
    original_unit: Option<Unit>,
    text: Option<String>,
}

impl ObservationBuilder {
    /// Creates a builder for the given metric kind
    pub fn new(kind: MetricKind) -> Self {
        Self {
            kind,
            id: None,
            status: ObservationStatus::Final,
            subject: None,
            effective: None,
            issued: None,
            value: None,
            canonical_value: None,
            device: None,
            original_unit: None,
            text: None,
        }
    }

    /// Overrides the generated id
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn status(mut self, status: ObservationStatus) -> Self {
        self.status = status;
        self
    }

    pub fn subject(mut self, user: &UserId) -> Self {
        self.subject = Some(user.clone());
        self
    }

    pub fn effective(mut self, at: DateTime<Utc>) -> Self {
        self.effective = Some(at);
        self
    }

    /// Overrides the issue time (defaults to now)
    pub fn issued(mut self, at: DateTime<Utc>) -> Self {
        self.issued = Some(at);
        self
    }

    /// Sets a quantity already expressed in the kind's canonical unit
    pub fn canonical_quantity(mut self, value: f64) -> Self {
        self.canonical_value = Some(value);
        self.value = None;
        self
    }

    /// Sets a non-quantity value slot
    pub fn value(mut self, value: ObservationValue) -> Self {
        self.value = Some(value);
        self.canonical_value = None;
        self
    }

    pub fn device(mut self, device: Option<DeviceId>) -> Self {
        self.device = device;
        self
    }

    /// Records the non-canonical unit the value was reported in
    pub fn original_unit(mut self, unit: Unit) -> Self {
        self.original_unit = Some(unit);
        self
    }

    /// Free-text label for `code.text`
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builds the Observation
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedMetric` when the kind has no vocabulary entry,
    /// `Validation` when the subject, effective time or value is missing, and
    /// `Conversion` for a non-finite quantity.
    pub fn build(self) -> Result<Observation> {
        let entry = self.kind.code_entry()?;
        let subject = self
            .subject
            .ok_or_else(|| MeridianError::Validation("subject is required".to_string()))?;
        let effective = self
            .effective
            .ok_or_else(|| MeridianError::Validation("effective time is required".to_string()))?;

        let value = match (self.canonical_value, self.value) {
            (Some(v), _) if !v.is_finite() => {
                return Err(MeridianError::Conversion(format!(
                    "{} value {v} is not a finite number",
                    self.kind
                )))
            }
            (Some(v), _) => ObservationValue::Quantity(Quantity::new(v, entry.unit)),
            (None, Some(value)) => value,
            (None, None) => {
                return Err(MeridianError::Validation("value is required".to_string()))
            }
        };

        let extension = self
            .original_unit
            .filter(|unit| *unit != entry.unit)
            .map(|unit| Extension {
                url: ORIGINAL_UNIT_EXTENSION_URL.to_string(),
                value_string: unit.ucum_code().to_string(),
            })
            .into_iter()
            .collect();

        Ok(Observation {
            resource_type: RESOURCE_TYPE.to_string(),
            id: self
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            status: self.status,
            category: vec![CodeableConcept {
                coding: vec![Coding {
                    system: OBSERVATION_CATEGORY_SYSTEM.to_string(),
                    code: entry.category.code().to_string(),
                    display: entry.category.display().to_string(),
                }],
                text: None,
            }],
            code: CodeableConcept {
                coding: vec![Coding {
                    system: entry.system.to_string(),
                    code: entry.code.to_string(),
                    display: entry.display.to_string(),
                }],
                text: self.text,
            },
            subject: Reference {
                reference: subject.patient_reference(),
            },
            effective_date_time: effective,
            issued: self.issued.unwrap_or_else(Utc::now),
            value,
            device: self.device.map(|d| Reference {
                reference: d.device_reference(),
            }),
            extension,
        })
    }
}
