//! Shared fixtures for sos-ingest integration tests
//!
//! - valid verbatim records and a small taxon forest
//! - a coordinator wired to in-memory collaborators
//! - store wrappers that fail writes or cancel a run after a number of chunks

#![allow(dead_code)]

use async_trait::async_trait;
use sos_common::Page;
use sos_ingest::framework::{
    BatchConfig, BatchCoordinator, Instance, ObservationReader, ObservationSink,
    ProviderDataAdmin, ReferenceData, StoreError,
};
use sos_ingest::processor::ProcessedObservation;
use sos_ingest::providers::{ProviderId, VerbatimObservation};
use sos_ingest::storage::{InMemoryAreaSource, InMemoryObservationStore, InMemoryVerbatimSource};
use sos_ingest::taxonomy::{BasicTaxon, TaxonTree};
use sos_ingest::vocabulary::{AreaFeature, AreaType, Geometry, VocabularyResolver};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Install a test-writer subscriber once per test binary
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// A record every processor accepts
pub fn verbatim(provider: u32, id: usize) -> VerbatimObservation {
    VerbatimObservation {
        event_start: Some("2024-06-01T08:30:00Z".to_string()),
        coordinate_x: Some("18.07".to_string()),
        coordinate_y: Some("59.33".to_string()),
        taxon_id: Some("3".to_string()),
        individual_count: Some("1".to_string()),
        ..VerbatimObservation::new(ProviderId(provider), id.to_string())
    }
}

pub fn verbatim_records(provider: u32, count: usize) -> Vec<VerbatimObservation> {
    (0..count).map(|i| verbatim(provider, i)).collect()
}

/// Animalia > Aves > Parus major
pub fn sample_taxa() -> Vec<BasicTaxon> {
    vec![
        BasicTaxon::new(1, None, "Animalia"),
        BasicTaxon::new(2, Some(1), "Aves"),
        BasicTaxon::new(3, Some(2), "Parus major"),
    ]
}

/// A square county around central Stockholm
pub fn stockholm_county() -> AreaFeature {
    AreaFeature {
        feature_id: "1".to_string(),
        name: "Stockholm".to_string(),
        geometry: Some(Geometry::Polygon(vec![vec![
            [17.0, 59.0],
            [19.0, 59.0],
            [19.0, 60.0],
            [17.0, 60.0],
            [17.0, 59.0],
        ]])),
    }
}

pub fn sample_areas() -> InMemoryAreaSource {
    InMemoryAreaSource::new().with_features(AreaType::County, vec![stockholm_county()])
}

pub fn reference_data() -> Arc<ReferenceData> {
    Arc::new(ReferenceData::new(
        TaxonTree::build(sample_taxa()).expect("sample taxa form a forest"),
        VocabularyResolver::with_static_vocabularies("sv-SE"),
    ))
}

/// Batch config with fast retries
pub fn fast_config() -> BatchConfig {
    BatchConfig {
        retry_backoff: Duration::from_millis(10),
        ..BatchConfig::default()
    }
}

pub fn coordinator(
    source: InMemoryVerbatimSource,
    store: Arc<dyn sos_ingest::framework::ObservationStore>,
    config: BatchConfig,
) -> BatchCoordinator {
    BatchCoordinator::new(
        Arc::new(source),
        store,
        Arc::new(sample_areas()),
        reference_data(),
        config,
    )
}

/// How a [`FaultyStore`] misbehaves on writes
#[derive(Debug, Clone)]
pub enum WriteFault {
    /// The first `n` writes fail transiently
    TransientTimes(u32),
    /// Every write fails transiently
    AlwaysTransient,
    /// Every write fails permanently
    AlwaysPermanent,
    /// Writes for this provider always fail permanently
    Provider(ProviderId),
    /// After `n` successful writes, cancel the token
    CancelAfter(u32, CancellationToken),
}

/// In-memory store wrapper with injected write behavior
pub struct FaultyStore {
    pub inner: Arc<InMemoryObservationStore>,
    fault: WriteFault,
    attempts: AtomicU32,
    successes: AtomicU32,
}

impl FaultyStore {
    pub fn new(inner: Arc<InMemoryObservationStore>, fault: WriteFault) -> Self {
        Self {
            inner,
            fault,
            attempts: AtomicU32::new(0),
            successes: AtomicU32::new(0),
        }
    }

    pub fn write_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObservationSink for FaultyStore {
    async fn write_many(
        &self,
        instance: Instance,
        provider_id: ProviderId,
        observations: &[ProcessedObservation],
    ) -> Result<usize, StoreError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        match &self.fault {
            WriteFault::TransientTimes(n) if attempt <= *n => {
                return Err(StoreError::Transient(format!("timeout on attempt {}", attempt)))
            }
            WriteFault::AlwaysTransient => {
                return Err(StoreError::Transient("connection reset".to_string()))
            }
            WriteFault::AlwaysPermanent => {
                return Err(StoreError::Permanent("constraint violation".to_string()))
            }
            WriteFault::Provider(failing) if *failing == provider_id => {
                return Err(StoreError::Permanent("provider table locked".to_string()))
            }
            _ => {}
        }

        let written = self.inner.write_many(instance, provider_id, observations).await?;
        let successes = self.successes.fetch_add(1, Ordering::SeqCst) + 1;
        if let WriteFault::CancelAfter(n, cancel) = &self.fault {
            if successes >= *n {
                cancel.cancel();
            }
        }
        Ok(written)
    }
}

#[async_trait]
impl ProviderDataAdmin for FaultyStore {
    async fn active_instance(&self) -> Result<Instance, StoreError> {
        self.inner.active_instance().await
    }

    async fn copy_provider_data(
        &self,
        provider_id: ProviderId,
        from: Instance,
        to: Instance,
    ) -> Result<u64, StoreError> {
        self.inner.copy_provider_data(provider_id, from, to).await
    }

    async fn delete_provider_data(
        &self,
        provider_id: ProviderId,
        instance: Instance,
    ) -> Result<u64, StoreError> {
        self.inner.delete_provider_data(provider_id, instance).await
    }

    async fn provider_ids(&self, instance: Instance) -> Result<Vec<ProviderId>, StoreError> {
        self.inner.provider_ids(instance).await
    }

    async fn activate_instance(&self, instance: Instance) -> Result<(), StoreError> {
        self.inner.activate_instance(instance).await
    }
}

#[async_trait]
impl ObservationReader for FaultyStore {
    async fn get_processed_batch(
        &self,
        instance: Instance,
        page: Page,
    ) -> Result<Vec<ProcessedObservation>, StoreError> {
        self.inner.get_processed_batch(instance, page).await
    }
}
