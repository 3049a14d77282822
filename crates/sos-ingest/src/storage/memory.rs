//! In-memory storage backends

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use sos_common::Page;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::framework::storage::{
    AreaSource, Instance, ObservationReader, ObservationSink, ProviderDataAdmin, StoreError,
    TaxonSource, VerbatimSource,
};
use crate::processor::ProcessedObservation;
use crate::providers::{ProviderId, VerbatimObservation};
use crate::taxonomy::BasicTaxon;
use crate::vocabulary::{AreaFeature, AreaType};

/// Verbatim records held per provider, in insertion order
#[derive(Debug, Clone, Default)]
pub struct InMemoryVerbatimSource {
    records: BTreeMap<ProviderId, Vec<VerbatimObservation>>,
}

impl InMemoryVerbatimSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider_id: ProviderId, records: Vec<VerbatimObservation>) -> Self {
        self.insert(provider_id, records);
        self
    }

    /// Append records to a provider
    pub fn insert(&mut self, provider_id: ProviderId, records: Vec<VerbatimObservation>) {
        self.records.entry(provider_id).or_default().extend(records);
    }

    pub fn provider_ids(&self) -> Vec<ProviderId> {
        self.records.keys().copied().collect()
    }

    pub fn len(&self, provider_id: ProviderId) -> usize {
        self.records.get(&provider_id).map_or(0, Vec::len)
    }
}

#[async_trait]
impl VerbatimSource for InMemoryVerbatimSource {
    async fn get_batch(
        &self,
        provider_id: ProviderId,
        page: Page,
    ) -> Result<Vec<VerbatimObservation>, StoreError> {
        Ok(self
            .records
            .get(&provider_id)
            .map(|records| records.iter().skip(page.skip).take(page.take).cloned().collect())
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryTaxonSource {
    taxa: Vec<BasicTaxon>,
}

impl InMemoryTaxonSource {
    pub fn new(taxa: Vec<BasicTaxon>) -> Self {
        Self { taxa }
    }
}

#[async_trait]
impl TaxonSource for InMemoryTaxonSource {
    async fn get_all_basic_taxa(&self) -> Result<Vec<BasicTaxon>, StoreError> {
        Ok(self.taxa.clone())
    }
}

/// Area features per type; counts fetches so lazy loading can be observed
#[derive(Debug, Default)]
pub struct InMemoryAreaSource {
    features: Mutex<BTreeMap<AreaType, Vec<AreaFeature>>>,
    fetches: AtomicU64,
}

impl InMemoryAreaSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_features(self, area_type: AreaType, features: Vec<AreaFeature>) -> Self {
        self.set_features(area_type, features);
        self
    }

    /// Replace the features of one type
    pub fn set_features(&self, area_type: AreaType, features: Vec<AreaFeature>) {
        self.features.lock().insert(area_type, features);
    }

    /// Number of `get_area_features` calls served so far
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AreaSource for InMemoryAreaSource {
    async fn get_area_features(&self, area_type: AreaType) -> Result<Vec<AreaFeature>, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .features
            .lock()
            .get(&area_type)
            .cloned()
            .unwrap_or_default())
    }
}

/// One provider's rows with an id index for upserts
#[derive(Debug, Clone, Default)]
struct ProviderRows {
    rows: Vec<ProcessedObservation>,
    by_id: HashMap<String, usize>,
}

impl ProviderRows {
    fn upsert(&mut self, observation: &ProcessedObservation) {
        match self.by_id.get(&observation.id) {
            Some(&index) => self.rows[index] = observation.clone(),
            None => {
                self.by_id.insert(observation.id.clone(), self.rows.len());
                self.rows.push(observation.clone());
            }
        }
    }
}

#[derive(Debug)]
struct StoreState {
    active: Instance,
    instances: BTreeMap<Instance, BTreeMap<ProviderId, ProviderRows>>,
}

/// Two-instance canonical store kept in memory
///
/// Starts with [`Instance::Blue`] active and both instances empty.
#[derive(Debug)]
pub struct InMemoryObservationStore {
    state: RwLock<StoreState>,
}

impl Default for InMemoryObservationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryObservationStore {
    pub fn new() -> Self {
        let instances = [Instance::Blue, Instance::Green]
            .into_iter()
            .map(|instance| (instance, BTreeMap::new()))
            .collect();
        Self {
            state: RwLock::new(StoreState {
                active: Instance::Blue,
                instances,
            }),
        }
    }

    /// Number of rows a provider has in an instance
    pub fn count(&self, instance: Instance, provider_id: ProviderId) -> usize {
        self.state
            .read()
            .instances
            .get(&instance)
            .and_then(|providers| providers.get(&provider_id))
            .map_or(0, |rows| rows.rows.len())
    }

    /// Total rows in an instance
    pub fn total(&self, instance: Instance) -> usize {
        self.state
            .read()
            .instances
            .get(&instance)
            .map_or(0, |providers| providers.values().map(|p| p.rows.len()).sum())
    }

    /// A provider's rows in an instance, in first-write order
    pub fn observations(&self, instance: Instance, provider_id: ProviderId) -> Vec<ProcessedObservation> {
        self.state
            .read()
            .instances
            .get(&instance)
            .and_then(|providers| providers.get(&provider_id))
            .map(|rows| rows.rows.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ObservationSink for InMemoryObservationStore {
    async fn write_many(
        &self,
        instance: Instance,
        provider_id: ProviderId,
        observations: &[ProcessedObservation],
    ) -> Result<usize, StoreError> {
        let mut state = self.state.write();
        let rows = state
            .instances
            .entry(instance)
            .or_default()
            .entry(provider_id)
            .or_default();
        for observation in observations {
            rows.upsert(observation);
        }
        Ok(observations.len())
    }
}

#[async_trait]
impl ProviderDataAdmin for InMemoryObservationStore {
    async fn active_instance(&self) -> Result<Instance, StoreError> {
        Ok(self.state.read().active)
    }

    async fn copy_provider_data(
        &self,
        provider_id: ProviderId,
        from: Instance,
        to: Instance,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.write();
        let copy = state
            .instances
            .get(&from)
            .and_then(|providers| providers.get(&provider_id))
            .cloned();
        let target = state.instances.entry(to).or_default();
        match copy {
            Some(rows) => {
                let count = rows.rows.len() as u64;
                target.insert(provider_id, rows);
                Ok(count)
            }
            None => {
                target.remove(&provider_id);
                Ok(0)
            }
        }
    }

    async fn delete_provider_data(
        &self,
        provider_id: ProviderId,
        instance: Instance,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.write();
        let removed = state
            .instances
            .get_mut(&instance)
            .and_then(|providers| providers.remove(&provider_id))
            .map_or(0, |rows| rows.rows.len() as u64);
        Ok(removed)
    }

    async fn provider_ids(&self, instance: Instance) -> Result<Vec<ProviderId>, StoreError> {
        Ok(self
            .state
            .read()
            .instances
            .get(&instance)
            .map(|providers| {
                providers
                    .iter()
                    .filter(|(_, rows)| !rows.rows.is_empty())
                    .map(|(id, _)| *id)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn activate_instance(&self, instance: Instance) -> Result<(), StoreError> {
        self.state.write().active = instance;
        Ok(())
    }
}

#[async_trait]
impl ObservationReader for InMemoryObservationStore {
    async fn get_processed_batch(
        &self,
        instance: Instance,
        page: Page,
    ) -> Result<Vec<ProcessedObservation>, StoreError> {
        Ok(self
            .state
            .read()
            .instances
            .get(&instance)
            .map(|providers| {
                providers
                    .values()
                    .flat_map(|rows| rows.rows.iter())
                    .skip(page.skip)
                    .take(page.take)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
