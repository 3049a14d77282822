//! Field description sets and record value extraction
//!
//! A [`FieldDescriptionSet`] is the single source of column order for a
//! table: the header row, every data row and the `meta.xml` field list are
//! all produced from it.

use std::collections::HashSet;

use super::terms::{DwcTerm, RowType};
use super::ArchiveError;
use crate::processor::{MeasurementOrFact, Multimedia, ProcessedObservation};

/// One field of a table
///
/// A field with a default value is a constant: it is declared in the
/// descriptor but takes no column in the data file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescription {
    pub term: DwcTerm,
    pub default_value: Option<String>,
}

impl FieldDescription {
    pub fn column(term: DwcTerm) -> Self {
        Self {
            term,
            default_value: None,
        }
    }

    pub fn constant(term: DwcTerm, value: impl Into<String>) -> Self {
        Self {
            term,
            default_value: Some(value.into()),
        }
    }

    pub fn is_constant(&self) -> bool {
        self.default_value.is_some()
    }
}

/// Anything that can provide a value per term
pub trait ArchiveRecord {
    fn value(&self, term: DwcTerm) -> Option<String>;
}

/// Extension record tied to its core row
pub struct Linked<'a, R> {
    pub core_id: &'a str,
    pub record: &'a R,
}

impl<R: ArchiveRecord> ArchiveRecord for Linked<'_, R> {
    fn value(&self, term: DwcTerm) -> Option<String> {
        match term {
            DwcTerm::OccurrenceId => Some(self.core_id.to_string()),
            other => self.record.value(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptionSet {
    row_type: RowType,
    id_term: DwcTerm,
    fields: Vec<FieldDescription>,
}

impl FieldDescriptionSet {
    /// Validate and build a field set
    ///
    /// Fails when the set is empty, a term appears twice, or the id term is
    /// not a column.
    pub fn new(
        row_type: RowType,
        id_term: DwcTerm,
        fields: Vec<FieldDescription>,
    ) -> Result<Self, ArchiveError> {
        if fields.is_empty() {
            return Err(ArchiveError::InvalidFieldSet(format!(
                "{} table has no fields",
                row_type.file_name()
            )));
        }

        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.term) {
                return Err(ArchiveError::InvalidFieldSet(format!(
                    "Duplicate term {} in {}",
                    field.term,
                    row_type.file_name()
                )));
            }
        }

        let set = Self {
            row_type,
            id_term,
            fields,
        };
        if set.id_index().is_none() {
            return Err(ArchiveError::InvalidFieldSet(format!(
                "Id term {} is not a column of {}",
                id_term,
                row_type.file_name()
            )));
        }
        Ok(set)
    }

    pub fn row_type(&self) -> RowType {
        self.row_type
    }

    pub fn id_term(&self) -> DwcTerm {
        self.id_term
    }

    pub fn fields(&self) -> &[FieldDescription] {
        &self.fields
    }

    /// Fields that take a column, in column order
    pub fn columns(&self) -> impl Iterator<Item = &FieldDescription> {
        self.fields.iter().filter(|f| !f.is_constant())
    }

    pub fn constants(&self) -> impl Iterator<Item = &FieldDescription> {
        self.fields.iter().filter(|f| f.is_constant())
    }

    pub fn column_count(&self) -> usize {
        self.columns().count()
    }

    /// Column index of the id term
    pub fn id_index(&self) -> Option<usize> {
        self.columns().position(|f| f.term == self.id_term)
    }

    pub fn header(&self) -> Vec<&'static str> {
        self.columns().map(|f| f.term.name()).collect()
    }

    /// Column values of one record; missing values are empty strings
    pub fn row(&self, record: &impl ArchiveRecord) -> Vec<String> {
        self.columns()
            .map(|f| record.value(f.term).unwrap_or_default())
            .collect()
    }

    /// Occurrence core with every column the processor fills
    pub fn default_core() -> Self {
        let fields = [
            DwcTerm::OccurrenceId,
            DwcTerm::BasisOfRecord,
            DwcTerm::Modified,
            DwcTerm::RecordedBy,
            DwcTerm::IndividualCount,
            DwcTerm::Sex,
            DwcTerm::LifeStage,
            DwcTerm::Behavior,
            DwcTerm::OccurrenceStatus,
            DwcTerm::OccurrenceRemarks,
            DwcTerm::EventDate,
            DwcTerm::DecimalLatitude,
            DwcTerm::DecimalLongitude,
            DwcTerm::CoordinateUncertaintyInMeters,
            DwcTerm::GeodeticDatum,
            DwcTerm::County,
            DwcTerm::Municipality,
            DwcTerm::Locality,
            DwcTerm::TaxonId,
            DwcTerm::ScientificName,
            DwcTerm::HigherClassification,
            DwcTerm::VerbatimScientificName,
        ]
        .into_iter()
        .map(FieldDescription::column)
        .chain([
            FieldDescription::constant(DwcTerm::Country, "Sweden"),
            FieldDescription::constant(DwcTerm::CountryCode, "SE"),
        ])
        .collect();

        Self {
            row_type: RowType::Occurrence,
            id_term: DwcTerm::OccurrenceId,
            fields,
        }
    }

    pub fn default_measurement_or_fact() -> Self {
        Self {
            row_type: RowType::MeasurementOrFact,
            id_term: DwcTerm::OccurrenceId,
            fields: [
                DwcTerm::OccurrenceId,
                DwcTerm::MeasurementType,
                DwcTerm::MeasurementValue,
                DwcTerm::MeasurementUnit,
            ]
            .into_iter()
            .map(FieldDescription::column)
            .collect(),
        }
    }

    pub fn default_multimedia() -> Self {
        Self {
            row_type: RowType::Multimedia,
            id_term: DwcTerm::OccurrenceId,
            fields: [
                DwcTerm::OccurrenceId,
                DwcTerm::Type,
                DwcTerm::Format,
                DwcTerm::Identifier,
                DwcTerm::Title,
                DwcTerm::Creator,
                DwcTerm::License,
            ]
            .into_iter()
            .map(FieldDescription::column)
            .collect(),
        }
    }
}

impl ArchiveRecord for ProcessedObservation {
    fn value(&self, term: DwcTerm) -> Option<String> {
        let occurrence = &self.occurrence;
        let location = &self.location;
        match term {
            DwcTerm::OccurrenceId => Some(occurrence.occurrence_id.clone()),
            DwcTerm::BasisOfRecord => self.basis_of_record.as_ref().map(|v| v.value.clone()),
            DwcTerm::Modified => self
                .modified
                .map(|m| m.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
            DwcTerm::RecordedBy => occurrence.recorded_by.clone(),
            DwcTerm::IndividualCount => occurrence.individual_count.map(|c| c.to_string()),
            DwcTerm::Sex => occurrence.sex.as_ref().map(|v| v.value.clone()),
            DwcTerm::LifeStage => occurrence.life_stage.as_ref().map(|v| v.value.clone()),
            DwcTerm::Behavior => occurrence.activity.as_ref().map(|v| v.value.clone()),
            DwcTerm::OccurrenceStatus => Some(occurrence.occurrence_status.value.clone()),
            DwcTerm::OccurrenceRemarks => occurrence.remarks.clone(),
            DwcTerm::EventDate => Some(self.event.event_date.clone()),
            DwcTerm::DecimalLatitude => Some(location.decimal_latitude.to_string()),
            DwcTerm::DecimalLongitude => Some(location.decimal_longitude.to_string()),
            DwcTerm::CoordinateUncertaintyInMeters => location
                .coordinate_uncertainty_in_meters
                .map(|u| u.to_string()),
            DwcTerm::GeodeticDatum => Some(location.geodetic_datum.clone()),
            DwcTerm::County => location.county.as_ref().map(|v| v.value.clone()),
            DwcTerm::Municipality => location.municipality.as_ref().map(|v| v.value.clone()),
            DwcTerm::Locality => location.locality.clone(),
            DwcTerm::TaxonId => self.taxon.as_ref().map(|t| t.taxon_id.to_string()),
            DwcTerm::ScientificName => self.taxon.as_ref().map(|t| t.scientific_name.clone()),
            DwcTerm::HigherClassification => self
                .taxon
                .as_ref()
                .map(|t| t.higher_classification.clone())
                .filter(|h| !h.is_empty()),
            DwcTerm::VerbatimScientificName => occurrence.verbatim_scientific_name.clone(),
            _ => None,
        }
    }
}

impl ArchiveRecord for MeasurementOrFact {
    fn value(&self, term: DwcTerm) -> Option<String> {
        match term {
            DwcTerm::MeasurementType => Some(self.measurement_type.clone()),
            DwcTerm::MeasurementValue => Some(self.measurement_value.clone()),
            DwcTerm::MeasurementUnit => self.measurement_unit.clone(),
            _ => None,
        }
    }
}

impl ArchiveRecord for Multimedia {
    fn value(&self, term: DwcTerm) -> Option<String> {
        match term {
            DwcTerm::Type => self.media_type.clone(),
            DwcTerm::Format => self.format.clone(),
            DwcTerm::Identifier => Some(self.identifier.clone()),
            DwcTerm::Title => self.title.clone(),
            DwcTerm::Creator => self.creator.clone(),
            DwcTerm::License => self.license.clone(),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_sets() {
        assert!(matches!(
            FieldDescriptionSet::new(RowType::Occurrence, DwcTerm::OccurrenceId, Vec::new()),
            Err(ArchiveError::InvalidFieldSet(_))
        ));
        assert!(FieldDescriptionSet::new(
            RowType::Occurrence,
            DwcTerm::OccurrenceId,
            vec![
                FieldDescription::column(DwcTerm::OccurrenceId),
                FieldDescription::column(DwcTerm::OccurrenceId),
            ],
        )
        .is_err());
        assert!(FieldDescriptionSet::new(
            RowType::Occurrence,
            DwcTerm::OccurrenceId,
            vec![FieldDescription::constant(DwcTerm::OccurrenceId, "x")],
        )
        .is_err());
    }

    #[test]
    fn test_constants_take_no_column() {
        let set = FieldDescriptionSet::new(
            RowType::MeasurementOrFact,
            DwcTerm::OccurrenceId,
            vec![
                FieldDescription::constant(DwcTerm::MeasurementUnit, "mm"),
                FieldDescription::column(DwcTerm::OccurrenceId),
                FieldDescription::column(DwcTerm::MeasurementValue),
            ],
        )
        .unwrap();

        assert_eq!(set.header(), ["occurrenceID", "measurementValue"]);
        assert_eq!(set.id_index(), Some(0));

        let fact = MeasurementOrFact {
            measurement_type: "length".to_string(),
            measurement_value: "12".to_string(),
            measurement_unit: None,
        };
        let row = set.row(&Linked {
            core_id: "urn:1",
            record: &fact,
        });
        assert_eq!(row, ["urn:1", "12"]);
    }

    #[test]
    fn test_default_sets_are_valid() {
        for set in [
            FieldDescriptionSet::default_core(),
            FieldDescriptionSet::default_measurement_or_fact(),
            FieldDescriptionSet::default_multimedia(),
        ] {
            let rebuilt =
                FieldDescriptionSet::new(set.row_type(), set.id_term(), set.fields().to_vec())
                    .unwrap();
            assert_eq!(rebuilt, set);
        }
    }
}
