//! Batch harvest framework
//!
//! Drives one provider at a time through fetch, process and write in bounded
//! chunks, with retries on transient storage failures and cooperative
//! cancellation. Shared reference data is read through versioned snapshots.

pub mod coordinator;
pub mod snapshot;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use coordinator::BatchCoordinator;
pub use snapshot::{ReferenceData, Snapshot, SnapshotCell};
pub use storage::{
    AreaSource, Instance, ObservationReader, ObservationSink, ObservationStore,
    ProviderDataAdmin, StoreError, TaxonSource, VerbatimSource,
};
pub use types::{BatchConfig, HarvestInfo, RunStatus, WriteMode};
