//! Taxon tree builder
//!
//! Turns the flat taxon list from taxonomy storage into a [`TaxonTree`] used to
//! enrich observations with scientific names and ancestor chains.
//!
//! # Example
//!
//! ```
//! use sos_ingest::taxonomy::{BasicTaxon, TaxonTree};
//!
//! let tree = TaxonTree::build(vec![
//!     BasicTaxon::new(1, None, "Animalia"),
//!     BasicTaxon::new(2, Some(1), "Aves"),
//!     BasicTaxon::new(3, Some(2), "Anser anser"),
//! ])
//! .unwrap();
//!
//! let names: Vec<_> = tree.ancestors(3).iter().map(|n| n.scientific_name.as_str()).collect();
//! assert_eq!(names, ["Animalia", "Aves"]);
//! ```

pub mod models;
pub mod tree;

pub use models::{BasicTaxon, TaxonNode};
pub use tree::TaxonTree;

use thiserror::Error;
use tracing::info;

use crate::framework::storage::{StoreError, TaxonSource};

#[derive(Error, Debug)]
pub enum TaxonomyError {
    #[error("Taxon {id} references missing parent {parent_id}")]
    MissingParent { id: i32, parent_id: i32 },

    #[error("Primary parent cycle: {}", format_path(.path))]
    Cycle { path: Vec<i32> },

    #[error("Failed to fetch taxa: {0}")]
    Source(#[from] StoreError),
}

impl TaxonomyError {
    /// Missing parents and cycles mean the taxonomy itself is unusable
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            TaxonomyError::MissingParent { .. } | TaxonomyError::Cycle { .. }
        )
    }
}

fn format_path(path: &[i32]) -> String {
    path.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Loads the complete taxon set from storage and builds a tree
pub struct TaxonTreeLoader;

impl TaxonTreeLoader {
    pub async fn load(source: &dyn TaxonSource) -> Result<TaxonTree, TaxonomyError> {
        let taxa = source.get_all_basic_taxa().await?;
        info!(taxa = taxa.len(), "Fetched basic taxa");
        TaxonTree::build(taxa)
    }
}
