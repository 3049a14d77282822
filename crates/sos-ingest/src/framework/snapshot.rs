//! Versioned immutable snapshots of shared reference data
//!
//! Readers call [`SnapshotCell::load`] once per operation and keep the
//! returned `Arc` for its duration; a concurrent [`SnapshotCell::publish`]
//! swaps the whole reference, so a reader sees either the old or the new
//! generation and never a partial rebuild.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::ops::Deref;
use std::sync::Arc;

use crate::taxonomy::TaxonTree;
use crate::vocabulary::{VocabularyRegistry, VocabularyResolver};

/// One published generation of a value
#[derive(Debug)]
pub struct Snapshot<T> {
    generation: u64,
    built_at: DateTime<Utc>,
    value: T,
}

impl<T> Snapshot<T> {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn value(&self) -> &T {
        &self.value
    }
}

impl<T> Deref for Snapshot<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

/// Atomically swapped reference to the current snapshot
#[derive(Debug)]
pub struct SnapshotCell<T> {
    current: RwLock<Arc<Snapshot<T>>>,
}

impl<T> SnapshotCell<T> {
    /// Cell holding `value` as generation 1
    pub fn new(value: T) -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot {
                generation: 1,
                built_at: Utc::now(),
                value,
            })),
        }
    }

    /// Borrow the current snapshot
    pub fn load(&self) -> Arc<Snapshot<T>> {
        Arc::clone(&self.current.read())
    }

    /// Replace the current snapshot, returning the new generation
    pub fn publish(&self, value: T) -> u64 {
        let mut current = self.current.write();
        let generation = current.generation + 1;
        *current = Arc::new(Snapshot {
            generation,
            built_at: Utc::now(),
            value,
        });
        generation
    }

    pub fn generation(&self) -> u64 {
        self.current.read().generation
    }
}

/// Reference data shared by every concurrently running provider pipeline
pub struct ReferenceData {
    pub taxonomy: SnapshotCell<TaxonTree>,
    pub vocabulary: VocabularyRegistry,
}

impl ReferenceData {
    pub fn new(tree: TaxonTree, resolver: VocabularyResolver) -> Self {
        Self {
            taxonomy: SnapshotCell::new(tree),
            vocabulary: VocabularyRegistry::new(resolver),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loaded_snapshot_survives_publish() {
        let cell = SnapshotCell::new(vec![1, 2, 3]);
        let before = cell.load();

        let generation = cell.publish(vec![4]);
        assert_eq!(generation, 2);

        assert_eq!(before.generation(), 1);
        assert_eq!(*before.value(), vec![1, 2, 3]);
        assert_eq!(cell.load().len(), 1);
        assert_eq!(cell.generation(), 2);
    }
}
