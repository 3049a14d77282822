//! Storage collaborator implementations
//!
//! - [`memory`]: in-process backends for tests and small CLI runs
//! - [`files`]: a JSON-lines data directory of raw provider records and reference data
//! - [`postgres`]: canonical store with two instance tables (`database` feature)

pub mod files;
pub mod memory;
#[cfg(feature = "database")]
pub mod postgres;

pub use files::JsonLinesDataDir;
pub use memory::{
    InMemoryAreaSource, InMemoryObservationStore, InMemoryTaxonSource, InMemoryVerbatimSource,
};
#[cfg(feature = "database")]
pub use postgres::PgObservationStore;
