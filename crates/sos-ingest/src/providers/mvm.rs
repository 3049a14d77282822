//! MVM environmental monitoring records (WGS84, already mostly string-typed)

use super::{ProviderId, VerbatimObservation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MvmObservation {
    pub record_id: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub coordinate_uncertainty: Option<String>,
    pub dyntaxa_id: Option<String>,
    pub taxon_name: Option<String>,
    pub sex: Option<String>,
    pub life_stage: Option<String>,
    pub quantity: Option<String>,
    pub is_negative: Option<bool>,
    pub recorded_by: Option<String>,
    pub remarks: Option<String>,
    pub modified: Option<String>,
}

pub fn adapt(provider_id: ProviderId, observation: MvmObservation) -> VerbatimObservation {
    VerbatimObservation {
        provider_id,
        source_record_id: observation.record_id,
        event_start: observation.start,
        event_end: observation.end,
        coordinate_x: observation.longitude,
        coordinate_y: observation.latitude,
        coordinate_system: Some("EPSG:4326".to_string()),
        coordinate_uncertainty: observation.coordinate_uncertainty,
        taxon_id: observation.dyntaxa_id,
        verbatim_scientific_name: observation.taxon_name,
        sex: observation.sex,
        life_stage: observation.life_stage,
        basis_of_record: Some("HumanObservation".to_string()),
        recorded_by: observation.recorded_by,
        individual_count: observation.quantity,
        is_absent: observation.is_negative.map(|b| b.to_string()),
        occurrence_remarks: observation.remarks,
        modified: observation.modified,
        ..Default::default()
    }
}
