//! Taxon data models

use serde::{Deserialize, Serialize};

/// A flat taxon record as delivered by taxonomy storage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BasicTaxon {
    /// Taxon id (e.g., 100024 for Anser anser)
    pub id: i32,
    /// Primary parent; `None` for roots
    pub parent_id: Option<i32>,
    /// Alternate classifications, advisory only
    #[serde(default)]
    pub secondary_parent_ids: Vec<i32>,
    pub scientific_name: String,
}

impl BasicTaxon {
    pub fn new(id: i32, parent_id: Option<i32>, scientific_name: impl Into<String>) -> Self {
        Self {
            id,
            parent_id,
            secondary_parent_ids: Vec::new(),
            scientific_name: scientific_name.into(),
        }
    }

    pub fn with_secondary_parents(mut self, ids: impl IntoIterator<Item = i32>) -> Self {
        self.secondary_parent_ids = ids.into_iter().collect();
        self
    }
}

/// A node of a built taxon tree
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TaxonNode {
    pub id: i32,
    pub parent_id: Option<i32>,
    /// Validated and sorted; never includes the node itself
    pub secondary_parent_ids: Vec<i32>,
    pub scientific_name: String,
    /// Primary children, sorted by id
    pub children: Vec<i32>,
}

impl From<BasicTaxon> for TaxonNode {
    fn from(taxon: BasicTaxon) -> Self {
        Self {
            id: taxon.id,
            parent_id: taxon.parent_id,
            secondary_parent_ids: taxon.secondary_parent_ids,
            scientific_name: taxon.scientific_name,
            children: Vec::new(),
        }
    }
}

impl TaxonNode {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}
