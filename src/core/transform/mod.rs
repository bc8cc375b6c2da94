//! Canonical conversion
//!
//! This module converts between the application's internal [`HealthRecord`]s
//! and canonical [`Observation`]s. Both directions work on batches and fail per
//! item: one unmappable record never aborts its siblings.
//!
//! - [`to_canonical`] - internal records into canonical Observations
//! - [`from_canonical`] - canonical Observations back into internal records
//!
//! [`HealthRecord`]: crate::domain::HealthRecord
//! [`Observation`]: crate::domain::Observation

pub mod canonical;

pub use canonical::{
    from_canonical, from_canonical_one, measurement_to_observation, source_device, to_canonical,
    to_canonical_one,
};

use crate::domain::MeridianError;

/// One item of a batch that could not be converted
#[derive(Debug)]
pub struct ItemFailure {
    /// Position of the item in the input batch
    pub index: usize,

    /// Identifier or short description of the failed item
    pub item: String,

    pub error: MeridianError,
}

impl ItemFailure {
    pub fn new(index: usize, item: impl Into<String>, error: MeridianError) -> Self {
        Self {
            index,
            item: item.into(),
            error,
        }
    }
}

/// Outcome of converting a batch: everything that converted, plus the
/// failures that were skipped
#[derive(Debug)]
pub struct ConversionBatch<T> {
    pub converted: Vec<T>,
    pub failures: Vec<ItemFailure>,
}

impl<T> ConversionBatch<T> {
    pub fn new() -> Self {
        Self {
            converted: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn push(&mut self, item: T) {
        self.converted.push(item);
    }

    pub fn fail(&mut self, index: usize, item: impl Into<String>, error: MeridianError) {
        self.failures.push(ItemFailure::new(index, item, error));
    }

    /// Appends another batch, keeping failure indices as reported by it
    pub fn extend(&mut self, other: ConversionBatch<T>) {
        self.converted.extend(other.converted);
        self.failures.extend(other.failures);
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl<T> Default for ConversionBatch<T> {
    fn default() -> Self {
        Self::new()
    }
}
