//! SOS Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Harvests species observations from several data providers, normalizes them
//! into one processed record shape and serializes the result as a Darwin Core
//! Archive.
//!
//! # Pipeline
//!
//! - **Providers**: per-provider adapters into [`providers::VerbatimObservation`]
//! - **Taxonomy**: the taxon forest used for lineage enrichment
//! - **Vocabulary**: controlled-term and area resolution
//! - **Processor**: one verbatim record in, one processed record or a skip reason out
//! - **Framework**: chunked, retried, cancellable provider runs
//! - **Orchestrator**: concurrent runs and blue/green instance promotion
//! - **Archive**: Darwin Core Archive writer, reader and exporter
//! - **Storage**: in-memory, JSON-lines and PostgreSQL collaborators
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sos_ingest::framework::{BatchCoordinator, BatchConfig, ReferenceData};
//! use sos_ingest::orchestrator::HarvestOrchestrator;
//! use sos_ingest::providers::ProviderId;
//! use sos_ingest::storage::{InMemoryObservationStore, JsonLinesDataDir};
//! use sos_ingest::taxonomy::TaxonTreeLoader;
//! use sos_ingest::vocabulary::VocabularyResolver;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let data = Arc::new(JsonLinesDataDir::new("./data"));
//!     let tree = TaxonTreeLoader::load(data.as_ref()).await?;
//!     let reference = Arc::new(ReferenceData::new(
//!         tree,
//!         VocabularyResolver::with_static_vocabularies("sv-SE"),
//!     ));
//!     let coordinator = BatchCoordinator::new(
//!         data.clone(),
//!         Arc::new(InMemoryObservationStore::new()),
//!         data,
//!         reference,
//!         BatchConfig::default(),
//!     );
//!     let report = HarvestOrchestrator::new(Arc::new(coordinator))
//!         .process(&[ProviderId(1)], &CancellationToken::new())
//!         .await?;
//!     assert!(report.all_succeeded());
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod framework;
pub mod orchestrator;
pub mod processor;
pub mod providers;
pub mod storage;
pub mod taxonomy;
pub mod vocabulary;

pub use config::IngestConfig;
pub use error::{IngestError, Result};
