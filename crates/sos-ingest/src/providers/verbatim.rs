//! Common intermediate shape produced by every source adapter

use super::ProviderId;
use serde::{Deserialize, Serialize};

/// Provider-tagged raw observation
///
/// All values are kept as the provider delivered them (as strings); parsing
/// and validation happen in the observation processor. `source_record_id`
/// is required but may be blank when the provider sent an incomplete record.
/// A record whose raw form could not be decoded at all carries the decode
/// error in `parse_error` and nothing else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerbatimObservation {
    pub provider_id: ProviderId,
    pub source_record_id: String,

    pub event_start: Option<String>,
    pub event_end: Option<String>,

    /// Easting (or longitude for geographic systems)
    pub coordinate_x: Option<String>,
    /// Northing (or latitude for geographic systems)
    pub coordinate_y: Option<String>,
    /// EPSG code, e.g. "EPSG:3006"; WGS84 when absent
    pub coordinate_system: Option<String>,
    pub coordinate_uncertainty: Option<String>,

    pub taxon_id: Option<String>,
    pub verbatim_scientific_name: Option<String>,

    pub sex: Option<String>,
    pub life_stage: Option<String>,
    pub activity: Option<String>,
    pub basis_of_record: Option<String>,

    pub county: Option<String>,
    pub municipality: Option<String>,
    pub locality: Option<String>,

    pub recorded_by: Option<String>,
    pub individual_count: Option<String>,
    pub is_absent: Option<String>,
    pub occurrence_remarks: Option<String>,
    pub modified: Option<String>,

    #[serde(default)]
    pub measurements: Vec<VerbatimMeasurement>,
    #[serde(default)]
    pub media: Vec<VerbatimMedia>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

impl VerbatimObservation {
    pub fn new(provider_id: ProviderId, source_record_id: impl Into<String>) -> Self {
        Self {
            provider_id,
            source_record_id: source_record_id.into(),
            ..Default::default()
        }
    }

    /// Placeholder for a raw record that could not be decoded
    pub fn malformed(provider_id: ProviderId, line: usize, error: impl Into<String>) -> Self {
        Self {
            provider_id,
            source_record_id: format!("line:{}", line),
            parse_error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn is_malformed(&self) -> bool {
        self.parse_error.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerbatimMeasurement {
    pub measurement_type: Option<String>,
    pub value: Option<String>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerbatimMedia {
    pub identifier: Option<String>,
    pub media_type: Option<String>,
    pub format: Option<String>,
    pub title: Option<String>,
    pub creator: Option<String>,
    pub license: Option<String>,
}
