//! NORS freshwater fish survey records
//!
//! Fishing dates come as compact `YYYYMMDD` strings and sites in RT90 2.5 gon V.
//! Length and weight readings become measurement-or-fact entries.

use super::{number_field, ProviderId, VerbatimMeasurement, VerbatimObservation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FishObservation {
    pub survey_id: String,
    pub fishing_date: Option<String>,
    pub rt90_northing: Option<String>,
    pub rt90_easting: Option<String>,
    pub lake_name: Option<String>,
    pub county: Option<String>,
    pub municipality: Option<String>,
    pub taxon_id: Option<i32>,
    pub species_name: Option<String>,
    pub catch_count: Option<i64>,
    pub mean_length_mm: Option<f64>,
    pub total_weight_g: Option<f64>,
    pub gear: Option<String>,
}

pub fn adapt(provider_id: ProviderId, observation: FishObservation) -> VerbatimObservation {
    let mut measurements = Vec::new();
    if let Some(length) = observation.mean_length_mm {
        measurements.push(VerbatimMeasurement {
            measurement_type: Some("Mean length".to_string()),
            value: Some(length.to_string()),
            unit: Some("mm".to_string()),
        });
    }
    if let Some(weight) = observation.total_weight_g {
        measurements.push(VerbatimMeasurement {
            measurement_type: Some("Total weight".to_string()),
            value: Some(weight.to_string()),
            unit: Some("g".to_string()),
        });
    }

    VerbatimObservation {
        provider_id,
        source_record_id: observation.survey_id,
        event_start: observation.fishing_date.clone(),
        event_end: observation.fishing_date,
        coordinate_x: observation.rt90_easting,
        coordinate_y: observation.rt90_northing,
        coordinate_system: Some("EPSG:3021".to_string()),
        taxon_id: number_field(observation.taxon_id),
        verbatim_scientific_name: observation.species_name,
        basis_of_record: Some("HumanObservation".to_string()),
        county: observation.county,
        municipality: observation.municipality,
        locality: observation.lake_name,
        individual_count: number_field(observation.catch_count),
        is_absent: observation.catch_count.map(|n| (n == 0).to_string()),
        occurrence_remarks: observation.gear.map(|gear| format!("Gear: {}", gear)),
        measurements,
        ..Default::default()
    }
}
