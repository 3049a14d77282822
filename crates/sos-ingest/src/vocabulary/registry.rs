//! Owner of the published resolver snapshot
//!
//! Area mappings are fetched lazily: the first run that needs an area type
//! loads it and publishes a new generation. Rebuilds are serialized by an
//! async mutex so two runs never fetch the same area type concurrently;
//! readers only ever touch the snapshot cell.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use super::areas::AreaMapping;
use super::resolver::VocabularyResolver;
use super::AreaType;
use crate::framework::snapshot::{Snapshot, SnapshotCell};
use crate::framework::storage::{AreaSource, StoreError};

pub struct VocabularyRegistry {
    cell: SnapshotCell<VocabularyResolver>,
    rebuild: Mutex<()>,
}

impl VocabularyRegistry {
    pub fn new(resolver: VocabularyResolver) -> Self {
        Self {
            cell: SnapshotCell::new(resolver),
            rebuild: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Arc<Snapshot<VocabularyResolver>> {
        self.cell.load()
    }

    pub fn generation(&self) -> u64 {
        self.cell.generation()
    }

    /// Make sure every requested area type has a mapping loaded
    ///
    /// Returns the snapshot to use, which includes all requested types.
    pub async fn ensure_area_types(
        &self,
        source: &dyn AreaSource,
        area_types: &[AreaType],
    ) -> Result<Arc<Snapshot<VocabularyResolver>>, StoreError> {
        let current = self.cell.load();
        if area_types.iter().all(|t| current.has_area_type(*t)) {
            return Ok(current);
        }

        let _guard = self.rebuild.lock().await;

        // Another run may have loaded them while we waited
        let current = self.cell.load();
        let missing: Vec<AreaType> = area_types
            .iter()
            .copied()
            .filter(|t| !current.has_area_type(*t))
            .collect();
        if missing.is_empty() {
            return Ok(current);
        }

        let mut next = current.value().clone();
        for area_type in missing {
            let features = source.get_area_features(area_type).await?;
            let mapping = AreaMapping::build(area_type, features);
            info!(area_type = %area_type, features = mapping.len(), "Loaded area mapping");
            next = next.with_area_mapping(mapping);
        }

        let generation = self.cell.publish(next);
        info!(generation, "Published vocabulary snapshot");
        Ok(self.cell.load())
    }

    /// Refetch every loaded area type and swap them in as one generation
    pub async fn rebuild_areas(&self, source: &dyn AreaSource) -> Result<u64, StoreError> {
        let _guard = self.rebuild.lock().await;

        let current = self.cell.load();
        let mut next = current.value().clone();
        for area_type in current.area_types() {
            let features = source.get_area_features(area_type).await?;
            next = next.with_area_mapping(AreaMapping::build(area_type, features));
        }

        let generation = self.cell.publish(next);
        info!(generation, "Rebuilt area mappings");
        Ok(generation)
    }
}
