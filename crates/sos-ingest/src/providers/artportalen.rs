//! Artportalen species sightings
//!
//! Sightings carry SWEREF99 TM site coordinates, numeric vocabulary ids for
//! sex/stage/activity and a list of observer names.

use super::{number_field, ProviderId, VerbatimMedia, VerbatimObservation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Sighting {
    pub sighting_id: Option<i64>,
    /// "YYYY-MM-DD"
    pub start_date: Option<String>,
    /// "HH:MM", local to the start date
    pub start_time: Option<String>,
    pub end_date: Option<String>,
    pub end_time: Option<String>,
    pub site: Option<Site>,
    pub taxon_id: Option<i32>,
    pub scientific_name: Option<String>,
    pub gender_id: Option<i32>,
    pub stage_id: Option<i32>,
    pub activity_id: Option<i32>,
    pub quantity: Option<String>,
    pub observers: Vec<String>,
    pub not_present: Option<bool>,
    pub comment: Option<String>,
    pub edit_date: Option<String>,
    pub media: Vec<SightingMedia>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Site {
    /// SWEREF99 TM easting
    pub x_coord: Option<f64>,
    /// SWEREF99 TM northing
    pub y_coord: Option<f64>,
    pub accuracy: Option<i32>,
    pub county_id: Option<String>,
    pub municipality_id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SightingMedia {
    pub url: Option<String>,
    pub file_type: Option<String>,
    pub copyright: Option<String>,
    pub uploaded_by: Option<String>,
    pub comment: Option<String>,
}

pub fn adapt(provider_id: ProviderId, sighting: Sighting) -> VerbatimObservation {
    let site = sighting.site.unwrap_or_default();

    VerbatimObservation {
        provider_id,
        source_record_id: number_field(sighting.sighting_id).unwrap_or_default(),
        event_start: join_date_time(sighting.start_date, sighting.start_time),
        event_end: join_date_time(sighting.end_date, sighting.end_time),
        coordinate_x: number_field(site.x_coord),
        coordinate_y: number_field(site.y_coord),
        coordinate_system: Some("EPSG:3006".to_string()),
        coordinate_uncertainty: number_field(site.accuracy),
        taxon_id: number_field(sighting.taxon_id),
        verbatim_scientific_name: sighting.scientific_name,
        sex: number_field(sighting.gender_id),
        life_stage: number_field(sighting.stage_id),
        activity: number_field(sighting.activity_id),
        basis_of_record: Some("HumanObservation".to_string()),
        county: site.county_id,
        municipality: site.municipality_id,
        locality: site.name,
        recorded_by: (!sighting.observers.is_empty()).then(|| sighting.observers.join(", ")),
        individual_count: sighting.quantity,
        is_absent: number_field(sighting.not_present),
        occurrence_remarks: sighting.comment,
        modified: sighting.edit_date,
        measurements: Vec::new(),
        media: sighting
            .media
            .into_iter()
            .map(|m| VerbatimMedia {
                identifier: m.url,
                media_type: Some("StillImage".to_string()),
                format: m.file_type,
                title: m.comment,
                creator: m.uploaded_by,
                license: m.copyright,
            })
            .collect(),
        parse_error: None,
    }
}

fn join_date_time(date: Option<String>, time: Option<String>) -> Option<String> {
    let date = date?;
    match time {
        Some(time) if !time.trim().is_empty() => Some(format!("{}T{}", date.trim(), time.trim())),
        _ => Some(date),
    }
}
