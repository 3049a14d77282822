//! Observation processor
//!
//! Converts one [`VerbatimObservation`] into one [`ProcessedObservation`]:
//!
//! 1. normalizes dates, coordinates and free-text fields
//! 2. resolves every code-valued field through the vocabulary resolver
//! 3. attaches taxon enrichment from the taxon tree
//!
//! A record whose required fields cannot be parsed is rejected with a
//! [`SkipReason`]; the caller tallies it and moves on. Recoverable problems
//! are reported as [`ProcessingWarning`]s next to the processed record.
//!
//! Processing is a pure function of the record and the two snapshots held by
//! the processor, so the same input always yields the same output.

pub mod coordinates;
pub mod dates;
pub mod models;

pub use models::{
    Event, Location, MeasurementOrFact, Multimedia, Occurrence, ProcessedObservation,
    ProcessedTaxon, ResolvedValue,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::framework::snapshot::Snapshot;
use crate::providers::VerbatimObservation;
use crate::taxonomy::TaxonTree;
use crate::vocabulary::{
    AreaType, FieldId, UnmappedTally, VocabularyId, VocabularyResolver,
};
use coordinates::CoordinateSystem;
use dates::DateBound;

const GEODETIC_DATUM: &str = "EPSG:4326";

/// Why a record was skipped
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MalformedRecord,
    MissingRecordId,
    MissingEventDate,
    InvalidEventDate,
    EventDateOrder,
    MissingCoordinates,
    InvalidCoordinates,
    UnsupportedCoordinateSystem,
}

impl SkipReason {
    pub fn as_str(&self) -> &str {
        match self {
            SkipReason::MalformedRecord => "malformed_record",
            SkipReason::MissingRecordId => "missing_record_id",
            SkipReason::MissingEventDate => "missing_event_date",
            SkipReason::InvalidEventDate => "invalid_event_date",
            SkipReason::EventDateOrder => "event_date_order",
            SkipReason::MissingCoordinates => "missing_coordinates",
            SkipReason::InvalidCoordinates => "invalid_coordinates",
            SkipReason::UnsupportedCoordinateSystem => "unsupported_coordinate_system",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-fatal problem found while processing a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingWarning {
    /// Taxon id missing from the tree or not a number; no enrichment attached
    UnknownTaxon { taxon_id: String },
    /// Individual count that is not a non-negative integer; dropped
    InvalidIndividualCount { raw: String },
}

/// A processed record plus what was noticed on the way
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedOutcome {
    pub observation: ProcessedObservation,
    pub warnings: Vec<ProcessingWarning>,
    pub unmapped: UnmappedTally,
}

/// Processes records against one taxon tree and one resolver generation
pub struct ObservationProcessor {
    tree: Arc<Snapshot<TaxonTree>>,
    resolver: Arc<Snapshot<VocabularyResolver>>,
}

impl ObservationProcessor {
    pub fn new(tree: Arc<Snapshot<TaxonTree>>, resolver: Arc<Snapshot<VocabularyResolver>>) -> Self {
        Self { tree, resolver }
    }

    pub fn tree_generation(&self) -> u64 {
        self.tree.generation()
    }

    pub fn resolver_generation(&self) -> u64 {
        self.resolver.generation()
    }

    pub fn process(&self, verbatim: &VerbatimObservation) -> Result<ProcessedOutcome, SkipReason> {
        if verbatim.is_malformed() {
            return Err(SkipReason::MalformedRecord);
        }
        let source_record_id =
            clean(Some(&verbatim.source_record_id)).ok_or(SkipReason::MissingRecordId)?;

        let event = self.event(verbatim)?;
        let (lon, lat) = self.position(verbatim)?;

        let mut warnings = Vec::new();
        let mut unmapped = UnmappedTally::default();

        let individual_count = clean(verbatim.individual_count.as_ref()).and_then(|raw| {
            match raw.parse::<u32>() {
                Ok(count) => Some(count),
                Err(_) => {
                    warnings.push(ProcessingWarning::InvalidIndividualCount { raw });
                    None
                }
            }
        });

        let status_code = if is_truthy(verbatim.is_absent.as_deref()) {
            "absent"
        } else {
            "present"
        };
        let occurrence_status = self
            .resolver
            .resolve(
                FieldId::Vocabulary(VocabularyId::OccurrenceStatus),
                status_code,
                &mut unmapped,
            )
            .into();

        let id = ProcessedObservation::observation_id(verbatim.provider_id, &source_record_id);

        let occurrence = Occurrence {
            occurrence_id: id.clone(),
            recorded_by: clean(verbatim.recorded_by.as_ref()),
            individual_count,
            sex: self.vocabulary(VocabularyId::Sex, verbatim.sex.as_ref(), &mut unmapped),
            life_stage: self.vocabulary(
                VocabularyId::LifeStage,
                verbatim.life_stage.as_ref(),
                &mut unmapped,
            ),
            activity: self.vocabulary(
                VocabularyId::Activity,
                verbatim.activity.as_ref(),
                &mut unmapped,
            ),
            occurrence_status,
            remarks: clean(verbatim.occurrence_remarks.as_ref()),
            verbatim_scientific_name: clean(verbatim.verbatim_scientific_name.as_ref()),
        };

        let location = Location {
            decimal_latitude: lat,
            decimal_longitude: lon,
            coordinate_uncertainty_in_meters: clean(verbatim.coordinate_uncertainty.as_ref())
                .and_then(|raw| coordinates::parse_coordinate(&raw))
                .filter(|v| *v >= 0.0 && *v <= u32::MAX as f64)
                .map(|v| v.round() as u32),
            geodetic_datum: GEODETIC_DATUM.to_string(),
            county: self.area(AreaType::County, verbatim.county.as_ref(), lon, lat, &mut unmapped),
            municipality: self.area(
                AreaType::Municipality,
                verbatim.municipality.as_ref(),
                lon,
                lat,
                &mut unmapped,
            ),
            locality: clean(verbatim.locality.as_ref()),
        };

        let taxon = clean(verbatim.taxon_id.as_ref()).and_then(|raw| {
            let taxon = raw.parse::<i32>().ok().and_then(|id| self.taxon(id));
            if taxon.is_none() {
                warnings.push(ProcessingWarning::UnknownTaxon { taxon_id: raw });
            }
            taxon
        });

        let observation = ProcessedObservation {
            id,
            provider_id: verbatim.provider_id,
            source_record_id,
            basis_of_record: self.vocabulary(
                VocabularyId::BasisOfRecord,
                verbatim.basis_of_record.as_ref(),
                &mut unmapped,
            ),
            modified: clean(verbatim.modified.as_ref())
                .and_then(|raw| dates::parse_instant(&raw, DateBound::Start)),
            occurrence,
            event,
            location,
            taxon,
            measurements: measurements(verbatim),
            multimedia: multimedia(verbatim),
        };

        Ok(ProcessedOutcome {
            observation,
            warnings,
            unmapped,
        })
    }

    fn event(&self, verbatim: &VerbatimObservation) -> Result<Event, SkipReason> {
        let raw_start = clean(verbatim.event_start.as_ref()).ok_or(SkipReason::MissingEventDate)?;
        let start = dates::parse_instant(&raw_start, DateBound::Start)
            .ok_or(SkipReason::InvalidEventDate)?;

        // A missing end closes the start value: the same instant, or the end of a date-only day
        let raw_end = clean(verbatim.event_end.as_ref()).unwrap_or(raw_start);
        let end =
            dates::parse_instant(&raw_end, DateBound::End).ok_or(SkipReason::InvalidEventDate)?;

        if end < start {
            return Err(SkipReason::EventDateOrder);
        }

        Ok(Event {
            start,
            end,
            event_date: dates::format_event_date(start, end),
        })
    }

    fn position(&self, verbatim: &VerbatimObservation) -> Result<(f64, f64), SkipReason> {
        let (Some(raw_x), Some(raw_y)) = (
            clean(verbatim.coordinate_x.as_ref()),
            clean(verbatim.coordinate_y.as_ref()),
        ) else {
            return Err(SkipReason::MissingCoordinates);
        };

        let system = match clean(verbatim.coordinate_system.as_ref()) {
            Some(code) => code
                .parse::<CoordinateSystem>()
                .map_err(|_| SkipReason::UnsupportedCoordinateSystem)?,
            None => CoordinateSystem::Wgs84,
        };

        let x = coordinates::parse_coordinate(&raw_x).ok_or(SkipReason::InvalidCoordinates)?;
        let y = coordinates::parse_coordinate(&raw_y).ok_or(SkipReason::InvalidCoordinates)?;
        coordinates::to_wgs84(system, x, y).ok_or(SkipReason::InvalidCoordinates)
    }

    fn vocabulary(
        &self,
        id: VocabularyId,
        raw: Option<&String>,
        unmapped: &mut UnmappedTally,
    ) -> Option<ResolvedValue> {
        clean(raw).map(|code| {
            self.resolver
                .resolve(FieldId::Vocabulary(id), &code, unmapped)
                .into()
        })
    }

    fn area(
        &self,
        area_type: AreaType,
        raw: Option<&String>,
        lon: f64,
        lat: f64,
        unmapped: &mut UnmappedTally,
    ) -> Option<ResolvedValue> {
        match clean(raw) {
            Some(code) => Some(
                self.resolver
                    .resolve(FieldId::Area(area_type), &code, unmapped)
                    .into(),
            ),
            None => self
                .resolver
                .locate(area_type, lon, lat)
                .map(ResolvedValue::from),
        }
    }

    fn taxon(&self, id: i32) -> Option<ProcessedTaxon> {
        let node = self.tree.get(id)?;
        let ancestors = self.tree.ancestors(id);
        Some(ProcessedTaxon {
            taxon_id: node.id,
            scientific_name: node.scientific_name.clone(),
            ancestor_ids: ancestors.iter().map(|a| a.id).collect(),
            higher_classification: ancestors
                .iter()
                .map(|a| a.scientific_name.as_str())
                .collect::<Vec<_>>()
                .join(" | "),
        })
    }
}

/// Trimmed value, or `None` when absent or blank
fn clean(raw: Option<&String>) -> Option<String> {
    raw.map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn is_truthy(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|s| s.trim().to_lowercase()).as_deref(),
        Some("true" | "1" | "yes" | "ja" | "y")
    )
}

fn measurements(verbatim: &VerbatimObservation) -> Vec<MeasurementOrFact> {
    verbatim
        .measurements
        .iter()
        .filter_map(|m| {
            Some(MeasurementOrFact {
                measurement_type: clean(m.measurement_type.as_ref())?,
                measurement_value: clean(m.value.as_ref())?,
                measurement_unit: clean(m.unit.as_ref()),
            })
        })
        .collect()
}

fn multimedia(verbatim: &VerbatimObservation) -> Vec<Multimedia> {
    verbatim
        .media
        .iter()
        .filter_map(|m| {
            Some(Multimedia {
                identifier: clean(m.identifier.as_ref())?,
                media_type: clean(m.media_type.as_ref()),
                format: clean(m.format.as_ref()),
                title: clean(m.title.as_ref()),
                creator: clean(m.creator.as_ref()),
                license: clean(m.license.as_ref()),
            })
        })
        .collect()
}
