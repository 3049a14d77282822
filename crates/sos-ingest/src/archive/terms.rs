//! Darwin Core and Dublin Core terms used in archives

use serde::{Deserialize, Serialize};
use std::fmt;

pub const DWC_NS: &str = "http://rs.tdwg.org/dwc/terms/";
pub const DC_NS: &str = "http://purl.org/dc/terms/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DwcTerm {
    // Occurrence
    OccurrenceId,
    BasisOfRecord,
    Modified,
    DatasetId,
    RecordedBy,
    IndividualCount,
    Sex,
    LifeStage,
    Behavior,
    OccurrenceStatus,
    OccurrenceRemarks,
    // Event
    EventDate,
    // Location
    DecimalLatitude,
    DecimalLongitude,
    CoordinateUncertaintyInMeters,
    GeodeticDatum,
    Country,
    CountryCode,
    County,
    Municipality,
    Locality,
    // Taxon
    TaxonId,
    ScientificName,
    HigherClassification,
    VerbatimScientificName,
    // MeasurementOrFact
    MeasurementType,
    MeasurementValue,
    MeasurementUnit,
    // Multimedia
    Type,
    Format,
    Identifier,
    Title,
    Creator,
    License,
}

impl DwcTerm {
    pub const ALL: [DwcTerm; 34] = [
        DwcTerm::OccurrenceId,
        DwcTerm::BasisOfRecord,
        DwcTerm::Modified,
        DwcTerm::DatasetId,
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
        DwcTerm::Country,
        DwcTerm::CountryCode,
        DwcTerm::County,
        DwcTerm::Municipality,
        DwcTerm::Locality,
        DwcTerm::TaxonId,
        DwcTerm::ScientificName,
        DwcTerm::HigherClassification,
        DwcTerm::VerbatimScientificName,
        DwcTerm::MeasurementType,
        DwcTerm::MeasurementValue,
        DwcTerm::MeasurementUnit,
        DwcTerm::Type,
        DwcTerm::Format,
        DwcTerm::Identifier,
        DwcTerm::Title,
        DwcTerm::Creator,
        DwcTerm::License,
    ];

    /// Local term name, used in header rows
    pub fn name(&self) -> &'static str {
        match self {
            DwcTerm::OccurrenceId => "occurrenceID",
            DwcTerm::BasisOfRecord => "basisOfRecord",
            DwcTerm::Modified => "modified",
            DwcTerm::DatasetId => "datasetID",
            DwcTerm::RecordedBy => "recordedBy",
            DwcTerm::IndividualCount => "individualCount",
            DwcTerm::Sex => "sex",
            DwcTerm::LifeStage => "lifeStage",
            DwcTerm::Behavior => "behavior",
            DwcTerm::OccurrenceStatus => "occurrenceStatus",
            DwcTerm::OccurrenceRemarks => "occurrenceRemarks",
            DwcTerm::EventDate => "eventDate",
            DwcTerm::DecimalLatitude => "decimalLatitude",
            DwcTerm::DecimalLongitude => "decimalLongitude",
            DwcTerm::CoordinateUncertaintyInMeters => "coordinateUncertaintyInMeters",
            DwcTerm::GeodeticDatum => "geodeticDatum",
            DwcTerm::Country => "country",
            DwcTerm::CountryCode => "countryCode",
            DwcTerm::County => "county",
            DwcTerm::Municipality => "municipality",
            DwcTerm::Locality => "locality",
            DwcTerm::TaxonId => "taxonID",
            DwcTerm::ScientificName => "scientificName",
            DwcTerm::HigherClassification => "higherClassification",
            DwcTerm::VerbatimScientificName => "verbatimScientificName",
            DwcTerm::MeasurementType => "measurementType",
            DwcTerm::MeasurementValue => "measurementValue",
            DwcTerm::MeasurementUnit => "measurementUnit",
            DwcTerm::Type => "type",
            DwcTerm::Format => "format",
            DwcTerm::Identifier => "identifier",
            DwcTerm::Title => "title",
            DwcTerm::Creator => "creator",
            DwcTerm::License => "license",
        }
    }

    fn namespace(&self) -> &'static str {
        match self {
            DwcTerm::Modified
            | DwcTerm::Type
            | DwcTerm::Format
            | DwcTerm::Identifier
            | DwcTerm::Title
            | DwcTerm::Creator
            | DwcTerm::License => DC_NS,
            _ => DWC_NS,
        }
    }

    /// Full term IRI, used in `meta.xml`
    pub fn iri(&self) -> String {
        format!("{}{}", self.namespace(), self.name())
    }

    pub fn from_iri(iri: &str) -> Option<DwcTerm> {
        DwcTerm::ALL.iter().copied().find(|term| term.iri() == iri)
    }
}

impl fmt::Display for DwcTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Row type of an archive table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RowType {
    Occurrence,
    MeasurementOrFact,
    Multimedia,
}

impl RowType {
    pub fn iri(&self) -> &'static str {
        match self {
            RowType::Occurrence => "http://rs.tdwg.org/dwc/terms/Occurrence",
            RowType::MeasurementOrFact => "http://rs.tdwg.org/dwc/terms/MeasurementOrFact",
            RowType::Multimedia => "http://rs.gbif.org/terms/1.0/Multimedia",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            RowType::Occurrence => "occurrence.txt",
            RowType::MeasurementOrFact => "measurementorfact.txt",
            RowType::Multimedia => "multimedia.txt",
        }
    }

    pub fn from_iri(iri: &str) -> Option<RowType> {
        [RowType::Occurrence, RowType::MeasurementOrFact, RowType::Multimedia]
            .into_iter()
            .find(|row_type| row_type.iri() == iri)
    }
}
