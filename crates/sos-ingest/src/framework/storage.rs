//! Storage collaborator interfaces
//!
//! The pipeline talks to storage through small capability traits, one per
//! thing it needs to do. Backends implement whichever capabilities they
//! support; see [`crate::storage`] for the in-memory, JSON-lines and
//! PostgreSQL implementations.
//!
//! The canonical store keeps two instances of the processed dataset. One is
//! active (queryable); the other is the target of shadow writes and becomes
//! active with [`ProviderDataAdmin::activate_instance`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sos_common::Page;
use std::fmt;
use thiserror::Error;

use crate::processor::ProcessedObservation;
use crate::providers::{ProviderId, VerbatimObservation};
use crate::taxonomy::BasicTaxon;
use crate::vocabulary::{AreaFeature, AreaType};

#[derive(Error, Debug)]
pub enum StoreError {
    /// Worth retrying: timeouts, dropped connections, busy backends
    #[error("Transient store failure: {0}")]
    Transient(String),

    #[error("Store failure: {0}")]
    Permanent(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Transient(_) => true,
            StoreError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::WouldBlock
            ),
            #[cfg(feature = "database")]
            StoreError::Database(e) => {
                matches!(e, sqlx::Error::PoolTimedOut | sqlx::Error::Io(_))
            }
            _ => false,
        }
    }
}

/// One of the two dataset instances of the canonical store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instance {
    Blue,
    Green,
}

impl Instance {
    pub fn other(self) -> Self {
        match self {
            Instance::Blue => Instance::Green,
            Instance::Green => Instance::Blue,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Instance::Blue => "blue",
            Instance::Green => "green",
        }
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Can fetch a provider's verbatim records page by page, in a stable order
#[async_trait]
pub trait VerbatimSource: Send + Sync {
    async fn get_batch(
        &self,
        provider_id: ProviderId,
        page: Page,
    ) -> Result<Vec<VerbatimObservation>, StoreError>;
}

/// Can fetch the complete flat taxon list
#[async_trait]
pub trait TaxonSource: Send + Sync {
    async fn get_all_basic_taxa(&self) -> Result<Vec<BasicTaxon>, StoreError>;
}

/// Can fetch area reference features of one type
#[async_trait]
pub trait AreaSource: Send + Sync {
    async fn get_area_features(&self, area_type: AreaType) -> Result<Vec<AreaFeature>, StoreError>;
}

/// Can write processed observations
#[async_trait]
pub trait ObservationSink: Send + Sync {
    /// Upsert by observation id, returning the number of rows written
    async fn write_many(
        &self,
        instance: Instance,
        provider_id: ProviderId,
        observations: &[ProcessedObservation],
    ) -> Result<usize, StoreError>;
}

/// Can manage per-provider data across the two instances
#[async_trait]
pub trait ProviderDataAdmin: Send + Sync {
    async fn active_instance(&self) -> Result<Instance, StoreError>;

    async fn inactive_instance(&self) -> Result<Instance, StoreError> {
        Ok(self.active_instance().await?.other())
    }

    /// Replace the provider's data in `to` with a copy of its data in `from`
    async fn copy_provider_data(
        &self,
        provider_id: ProviderId,
        from: Instance,
        to: Instance,
    ) -> Result<u64, StoreError>;

    async fn delete_provider_data(
        &self,
        provider_id: ProviderId,
        instance: Instance,
    ) -> Result<u64, StoreError>;

    /// Providers with data in the instance, ascending
    async fn provider_ids(&self, instance: Instance) -> Result<Vec<ProviderId>, StoreError>;

    async fn activate_instance(&self, instance: Instance) -> Result<(), StoreError>;
}

/// Can page through processed observations of an instance
///
/// Rows are ordered by provider id, then by first write.
#[async_trait]
pub trait ObservationReader: Send + Sync {
    async fn get_processed_batch(
        &self,
        instance: Instance,
        page: Page,
    ) -> Result<Vec<ProcessedObservation>, StoreError>;
}

/// A full canonical store backend
pub trait ObservationStore: ObservationSink + ProviderDataAdmin + ObservationReader {}

impl<T> ObservationStore for T where T: ObservationSink + ProviderDataAdmin + ObservationReader {}
