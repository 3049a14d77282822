//! Code -> canonical id / label resolution

use std::collections::{BTreeMap, HashMap};

use super::areas::{AreaFeature, AreaMapping};
use super::vocabularies::{self, VocabularyEntry};
use super::{AreaType, FieldId, Resolution, UnmappedTally, VocabularyId};

/// Resolves raw field values for one culture
///
/// A resolver is immutable once published in a snapshot; a new generation is
/// built by cloning and adding or replacing area mappings.
#[derive(Debug, Clone)]
pub struct VocabularyResolver {
    culture: String,
    tables: BTreeMap<VocabularyId, HashMap<String, &'static VocabularyEntry>>,
    areas: BTreeMap<AreaType, AreaMapping>,
}

impl VocabularyResolver {
    /// Resolver with every static vocabulary and no area mappings
    pub fn with_static_vocabularies(culture: impl Into<String>) -> Self {
        let tables = VocabularyId::ALL
            .iter()
            .map(|id| {
                let mut by_code = HashMap::new();
                for entry in vocabularies::entries(*id) {
                    by_code.insert(normalize(entry.canonical_id), entry);
                    for code in entry.codes {
                        by_code.insert(normalize(code), entry);
                    }
                }
                (*id, by_code)
            })
            .collect();

        Self {
            culture: culture.into(),
            tables,
            areas: BTreeMap::new(),
        }
    }

    /// Add or replace the mapping for the mapping's area type
    pub fn with_area_mapping(mut self, mapping: AreaMapping) -> Self {
        self.areas.insert(mapping.area_type(), mapping);
        self
    }

    pub fn culture(&self) -> &str {
        &self.culture
    }

    pub fn has_area_type(&self, area_type: AreaType) -> bool {
        self.areas.contains_key(&area_type)
    }

    pub fn area_types(&self) -> Vec<AreaType> {
        self.areas.keys().copied().collect()
    }

    pub fn area_mapping(&self, area_type: AreaType) -> Option<&AreaMapping> {
        self.areas.get(&area_type)
    }

    /// Resolve a raw value, counting it in `tally` when no mapping exists
    pub fn resolve(&self, field: FieldId, raw: &str, tally: &mut UnmappedTally) -> Resolution {
        let resolution = self.lookup(field, raw);
        if !resolution.is_mapped() {
            tally.record(field);
        }
        resolution
    }

    fn lookup(&self, field: FieldId, raw: &str) -> Resolution {
        let code = normalize(raw);
        match field {
            FieldId::Vocabulary(id) => self
                .tables
                .get(&id)
                .and_then(|table| table.get(&code))
                .map(|entry| Resolution::Mapped {
                    canonical_id: entry.canonical_id.to_string(),
                    label: self.label(entry).to_string(),
                }),
            FieldId::Area(area_type) => self
                .areas
                .get(&area_type)
                .and_then(|mapping| mapping.lookup(&code))
                .map(area_resolution),
        }
        .unwrap_or_else(|| Resolution::Unmapped(raw.to_string()))
    }

    /// Area containing the point, when a mapping for the area type is loaded
    pub fn locate(&self, area_type: AreaType, lon: f64, lat: f64) -> Option<Resolution> {
        self.areas
            .get(&area_type)
            .and_then(|mapping| mapping.locate(lon, lat))
            .map(area_resolution)
    }

    fn label<'a>(&self, entry: &'a VocabularyEntry) -> &'a str {
        entry
            .labels
            .iter()
            .find(|(culture, _)| culture.eq_ignore_ascii_case(&self.culture))
            .or_else(|| entry.labels.first())
            .map(|(_, label)| *label)
            .unwrap_or(entry.canonical_id)
    }
}

fn area_resolution(feature: &AreaFeature) -> Resolution {
    Resolution::Mapped {
        canonical_id: feature.feature_id.clone(),
        label: feature.name.clone(),
    }
}

fn normalize(code: &str) -> String {
    code.trim().to_lowercase()
}
