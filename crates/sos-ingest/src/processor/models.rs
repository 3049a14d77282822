//! Canonical processed observation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::providers::ProviderId;
use crate::vocabulary::Resolution;

/// Resolved (or passed-through) vocabulary value
///
/// `id` is `None` when the raw value had no mapping; `value` then holds the
/// raw value unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedValue {
    pub id: Option<String>,
    pub value: String,
}

impl From<Resolution> for ResolvedValue {
    fn from(resolution: Resolution) -> Self {
        match resolution {
            Resolution::Mapped {
                canonical_id,
                label,
            } => Self {
                id: Some(canonical_id),
                value: label,
            },
            Resolution::Unmapped(raw) => Self {
                id: None,
                value: raw,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedObservation {
    /// `urn:lsid:sos:{provider_id}:{source_record_id}`
    pub id: String,
    pub provider_id: ProviderId,
    pub source_record_id: String,
    pub basis_of_record: Option<ResolvedValue>,
    pub modified: Option<DateTime<Utc>>,
    pub occurrence: Occurrence,
    pub event: Event,
    pub location: Location,
    pub taxon: Option<ProcessedTaxon>,
    #[serde(default)]
    pub measurements: Vec<MeasurementOrFact>,
    #[serde(default)]
    pub multimedia: Vec<Multimedia>,
}

impl ProcessedObservation {
    pub fn observation_id(provider_id: ProviderId, source_record_id: &str) -> String {
        format!("urn:lsid:sos:{}:{}", provider_id, source_record_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    pub occurrence_id: String,
    pub recorded_by: Option<String>,
    pub individual_count: Option<u32>,
    pub sex: Option<ResolvedValue>,
    pub life_stage: Option<ResolvedValue>,
    pub activity: Option<ResolvedValue>,
    pub occurrence_status: ResolvedValue,
    pub remarks: Option<String>,
    pub verbatim_scientific_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Darwin Core `eventDate`: an instant, or `start/end` for an interval
    pub event_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub decimal_latitude: f64,
    pub decimal_longitude: f64,
    pub coordinate_uncertainty_in_meters: Option<u32>,
    pub geodetic_datum: String,
    pub county: Option<ResolvedValue>,
    pub municipality: Option<ResolvedValue>,
    pub locality: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedTaxon {
    pub taxon_id: i32,
    pub scientific_name: String,
    /// Primary ancestors, root first
    pub ancestor_ids: Vec<i32>,
    /// Ancestor names joined with " | ", root first
    pub higher_classification: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementOrFact {
    pub measurement_type: String,
    pub measurement_value: String,
    pub measurement_unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Multimedia {
    pub identifier: String,
    pub media_type: Option<String>,
    pub format: Option<String>,
    pub title: Option<String>,
    pub creator: Option<String>,
    pub license: Option<String>,
}
