//! Vocabulary and field-mapping resolution
//!
//! Coded values (sex, life stage, administrative areas, ...) are resolved to a
//! canonical id and a localized label. Two kinds of mapping exist:
//!
//! - static vocabularies shipped in [`vocabularies`], loaded once
//! - area mappings built from area reference features per [`AreaType`]
//!
//! A code without a mapping is passed through unchanged and counted in an
//! [`UnmappedTally`]; it never fails processing.

pub mod areas;
pub mod registry;
pub mod resolver;
pub mod vocabularies;

pub use areas::{AreaFeature, AreaMapping, Geometry};
pub use registry::VocabularyRegistry;
pub use resolver::VocabularyResolver;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Statically shipped vocabularies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VocabularyId {
    Sex,
    LifeStage,
    Activity,
    BasisOfRecord,
    OccurrenceStatus,
}

impl VocabularyId {
    pub const ALL: [VocabularyId; 5] = [
        VocabularyId::Sex,
        VocabularyId::LifeStage,
        VocabularyId::Activity,
        VocabularyId::BasisOfRecord,
        VocabularyId::OccurrenceStatus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VocabularyId::Sex => "sex",
            VocabularyId::LifeStage => "lifeStage",
            VocabularyId::Activity => "activity",
            VocabularyId::BasisOfRecord => "basisOfRecord",
            VocabularyId::OccurrenceStatus => "occurrenceStatus",
        }
    }
}

/// Administrative area layers with dynamically built mappings
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaType {
    County,
    Municipality,
    Province,
    Parish,
}

impl AreaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AreaType::County => "county",
            AreaType::Municipality => "municipality",
            AreaType::Province => "province",
            AreaType::Parish => "parish",
        }
    }
}

impl fmt::Display for AreaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AreaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "county" => Ok(AreaType::County),
            "municipality" => Ok(AreaType::Municipality),
            "province" => Ok(AreaType::Province),
            "parish" => Ok(AreaType::Parish),
            other => Err(format!("Unknown area type: {}", other)),
        }
    }
}

/// A field whose raw values go through the resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldId {
    Vocabulary(VocabularyId),
    Area(AreaType),
}

impl FieldId {
    pub fn name(&self) -> &'static str {
        match self {
            FieldId::Vocabulary(id) => id.as_str(),
            FieldId::Area(area_type) => area_type.as_str(),
        }
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of resolving one raw value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Mapped { canonical_id: String, label: String },
    /// No mapping exists; the raw value is passed through unchanged
    Unmapped(String),
}

impl Resolution {
    pub fn is_mapped(&self) -> bool {
        matches!(self, Resolution::Mapped { .. })
    }
}

/// Unmapped value counts, in total and per field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmappedTally {
    pub total: u64,
    pub by_field: BTreeMap<String, u64>,
}

impl UnmappedTally {
    pub fn record(&mut self, field: FieldId) {
        self.total += 1;
        *self.by_field.entry(field.name().to_string()).or_insert(0) += 1;
    }

    pub fn merge(&mut self, other: &UnmappedTally) {
        self.total += other.total;
        for (field, count) in &other.by_field {
            *self.by_field.entry(field.clone()).or_insert(0) += count;
        }
    }

    pub fn count(&self, field: FieldId) -> u64 {
        self.by_field.get(field.name()).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}
