//! Batch coordinator
//!
//! Runs one provider's harvest:
//! 1. Load the area mappings the run needs and borrow reference snapshots
//! 2. Page through the verbatim source one chunk at a time
//! 3. Process each chunk and write it to the target instance
//! 4. Merge chunk statistics into the run's [`HarvestInfo`]
//!
//! Chunks are handled strictly in source order. A chunk's statistics are
//! merged only after its write succeeded, so a retried chunk is never
//! counted twice.

use sos_common::Page;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::snapshot::ReferenceData;
use super::storage::{AreaSource, Instance, ObservationStore, StoreError, VerbatimSource};
use super::types::{BatchConfig, HarvestInfo, RunStatus, WriteMode};
use crate::processor::{
    ObservationProcessor, ProcessedObservation, ProcessingWarning, SkipReason,
};
use crate::providers::{ProviderId, VerbatimObservation};
use crate::vocabulary::UnmappedTally;

/// Why a run stopped before exhausting its source
enum Interrupt {
    Canceled,
    Failed(String),
}

/// Per-chunk counters, merged into the run once the chunk is written
#[derive(Debug, Default)]
struct ChunkStats {
    read: u64,
    processed: u64,
    skipped: u64,
    skip_reasons: BTreeMap<SkipReason, u64>,
    unmapped: UnmappedTally,
    unknown_taxa: u64,
    invalid_individual_counts: u64,
}

impl ChunkStats {
    fn merge_into(self, info: &mut HarvestInfo) {
        info.items_read += self.read;
        info.items_processed += self.processed;
        info.items_skipped += self.skipped;
        for (reason, count) in self.skip_reasons {
            *info.skip_reasons.entry(reason).or_insert(0) += count;
        }
        info.unmapped_values.merge(&self.unmapped);
        info.unknown_taxa += self.unknown_taxa;
        info.invalid_individual_counts += self.invalid_individual_counts;
    }
}

/// Coordinates harvest runs for single providers
pub struct BatchCoordinator {
    source: Arc<dyn VerbatimSource>,
    store: Arc<dyn ObservationStore>,
    areas: Arc<dyn AreaSource>,
    reference: Arc<ReferenceData>,
    config: BatchConfig,
}

impl BatchCoordinator {
    pub fn new(
        source: Arc<dyn VerbatimSource>,
        store: Arc<dyn ObservationStore>,
        areas: Arc<dyn AreaSource>,
        reference: Arc<ReferenceData>,
        config: BatchConfig,
    ) -> Self {
        Self {
            source,
            store,
            areas,
            reference,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn ObservationStore> {
        &self.store
    }

    pub fn areas(&self) -> &Arc<dyn AreaSource> {
        &self.areas
    }

    pub fn reference(&self) -> &Arc<ReferenceData> {
        &self.reference
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Harvest one provider according to the configured write mode
    ///
    /// Never returns an error: failures and cancellation are reported through
    /// the returned run status.
    pub async fn run(
        &self,
        provider_id: ProviderId,
        chunk_size: usize,
        cancel: &CancellationToken,
    ) -> HarvestInfo {
        match self.config.write_mode {
            WriteMode::Direct => match self.store.active_instance().await {
                Ok(active) => self.run_into(provider_id, chunk_size, active, cancel).await,
                Err(e) => failed_before_start(provider_id, format!("Failed to resolve active instance: {}", e)),
            },
            WriteMode::Shadow => self.run_shadow(provider_id, chunk_size, cancel).await,
        }
    }

    async fn run_shadow(
        &self,
        provider_id: ProviderId,
        chunk_size: usize,
        cancel: &CancellationToken,
    ) -> HarvestInfo {
        let active = match self.store.active_instance().await {
            Ok(active) => active,
            Err(e) => {
                return failed_before_start(provider_id, format!("Failed to resolve active instance: {}", e))
            }
        };
        let target = active.other();

        if let Err(e) = self.store.delete_provider_data(provider_id, target).await {
            return failed_before_start(
                provider_id,
                format!("Failed to clear provider data in {}: {}", target, e),
            );
        }

        let mut info = self.run_into(provider_id, chunk_size, target, cancel).await;
        if info.status != RunStatus::Succeeded {
            return info;
        }

        match self.promote(active, target, &BTreeSet::from([provider_id])).await {
            Ok(()) => info!(provider_id = %provider_id, instance = %target, "Activated shadow instance"),
            Err(e) => {
                error!(provider_id = %provider_id, error = %e, "Failed to promote shadow instance");
                info.fail(format!("Failed to promote {}: {}", target, e));
            }
        }
        info
    }

    /// Carry untouched providers over to `target` and make it the active instance
    pub(crate) async fn promote(
        &self,
        active: Instance,
        target: Instance,
        refreshed: &BTreeSet<ProviderId>,
    ) -> Result<(), StoreError> {
        self.carry_over(active, target, refreshed).await?;
        self.store.activate_instance(target).await
    }

    /// Make `to` hold the same data as `from` for every provider not in `refreshed`
    ///
    /// Returns the number of rows copied.
    pub(crate) async fn carry_over(
        &self,
        from: Instance,
        to: Instance,
        refreshed: &BTreeSet<ProviderId>,
    ) -> Result<u64, StoreError> {
        let source_providers: BTreeSet<ProviderId> =
            self.store.provider_ids(from).await?.into_iter().collect();

        let mut copied = 0;
        for provider_id in source_providers.difference(refreshed) {
            copied += self.store.copy_provider_data(*provider_id, from, to).await?;
        }

        // Providers gone from the source instance must not linger in the target
        for provider_id in self.store.provider_ids(to).await? {
            if !source_providers.contains(&provider_id) && !refreshed.contains(&provider_id) {
                self.store.delete_provider_data(provider_id, to).await?;
            }
        }

        debug!(from = %from, to = %to, rows = copied, "Carried over untouched providers");
        Ok(copied)
    }

    /// Harvest one provider into an explicit instance without promoting it
    #[instrument(skip(self, cancel), fields(provider_id = %provider_id, instance = %instance))]
    pub async fn run_into(
        &self,
        provider_id: ProviderId,
        chunk_size: usize,
        instance: Instance,
        cancel: &CancellationToken,
    ) -> HarvestInfo {
        let mut info = HarvestInfo::start(provider_id);
        info!(run_id = %info.id, chunk_size, "Starting harvest run");

        match self.drive(&mut info, chunk_size.max(1), instance, cancel).await {
            Ok(()) => info.finish(RunStatus::Succeeded),
            Err(Interrupt::Canceled) => {
                warn!(chunks = info.chunks_processed, "Harvest run canceled");
                info.finish(RunStatus::Canceled);
            }
            Err(Interrupt::Failed(message)) => {
                error!(chunks = info.chunks_processed, error = %message, "Harvest run failed");
                info.fail(message);
            }
        }

        self.report(&info);
        info
    }

    async fn drive(
        &self,
        info: &mut HarvestInfo,
        chunk_size: usize,
        instance: Instance,
        cancel: &CancellationToken,
    ) -> Result<(), Interrupt> {
        if cancel.is_cancelled() {
            return Err(Interrupt::Canceled);
        }

        let resolver = self
            .reference
            .vocabulary
            .ensure_area_types(self.areas.as_ref(), &self.config.area_types)
            .await
            .map_err(|e| Interrupt::Failed(format!("Failed to load area mappings: {}", e)))?;
        let tree = self.reference.taxonomy.load();
        debug!(
            tree_generation = tree.generation(),
            resolver_generation = resolver.generation(),
            "Borrowed reference snapshots"
        );
        let processor = ObservationProcessor::new(tree, resolver);

        let provider_id = info.provider_id;
        let mut page = Page::first(chunk_size);
        loop {
            if cancel.is_cancelled() {
                return Err(Interrupt::Canceled);
            }

            let batch = self
                .with_retry("fetch", info, cancel, || self.source.get_batch(provider_id, page))
                .await?;
            if batch.is_empty() {
                return Ok(());
            }

            let (observations, stats) = process_chunk(&processor, &batch);
            if !observations.is_empty() {
                self.with_retry("write", info, cancel, || {
                    self.store.write_many(instance, provider_id, &observations)
                })
                .await?;
            }

            let skipped = stats.skipped;
            stats.merge_into(info);
            info.chunks_processed += 1;
            debug!(
                chunk = page.number(),
                read = batch.len(),
                written = observations.len(),
                skipped,
                "Chunk written"
            );

            if cancel.is_cancelled() {
                return Err(Interrupt::Canceled);
            }
            if page.is_last(batch.len()) {
                return Ok(());
            }
            page = page.next();
        }
    }

    /// Run a storage call, retrying transient failures with exponential backoff
    async fn with_retry<T, F, Fut>(
        &self,
        action: &'static str,
        info: &mut HarvestInfo,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, Interrupt>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.config.backoff_for(attempt);
                    warn!(
                        action,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient store failure, retrying"
                    );
                    info.chunk_retries += 1;
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(Interrupt::Canceled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => {
                    return Err(Interrupt::Failed(format!(
                        "Chunk {} failed after {} attempt(s): {}",
                        action, attempt, e
                    )))
                }
            }
        }
    }

    fn report(&self, info: &HarvestInfo) {
        let skip_rate = info.skip_rate();
        info!(
            status = %info.status,
            read = info.items_read,
            processed = info.items_processed,
            skipped = info.items_skipped,
            unmapped = info.unmapped_values.total,
            unknown_taxa = info.unknown_taxa,
            chunks = info.chunks_processed,
            retries = info.chunk_retries,
            "Harvest run finished"
        );
        if skip_rate > self.config.skip_rate_warn_threshold {
            warn!(
                skip_rate,
                threshold = self.config.skip_rate_warn_threshold,
                "Skip rate above threshold"
            );
        }
    }
}

fn failed_before_start(provider_id: ProviderId, message: String) -> HarvestInfo {
    error!(provider_id = %provider_id, error = %message, "Harvest run failed before start");
    let mut info = HarvestInfo::start(provider_id);
    info.fail(message);
    info
}

fn process_chunk(
    processor: &ObservationProcessor,
    batch: &[VerbatimObservation],
) -> (Vec<ProcessedObservation>, ChunkStats) {
    let mut stats = ChunkStats::default();
    let mut observations = Vec::with_capacity(batch.len());

    for verbatim in batch {
        stats.read += 1;
        match processor.process(verbatim) {
            Ok(outcome) => {
                for warning in &outcome.warnings {
                    match warning {
                        ProcessingWarning::UnknownTaxon { taxon_id } => {
                            stats.unknown_taxa += 1;
                            debug!(source_record_id = %verbatim.source_record_id, %taxon_id, "Unknown taxon");
                        }
                        ProcessingWarning::InvalidIndividualCount { raw } => {
                            stats.invalid_individual_counts += 1;
                            debug!(source_record_id = %verbatim.source_record_id, %raw, "Invalid individual count");
                        }
                    }
                }
                stats.unmapped.merge(&outcome.unmapped);
                stats.processed += 1;
                observations.push(outcome.observation);
            }
            Err(reason) => {
                warn!(source_record_id = %verbatim.source_record_id, reason = %reason, "Skipping record");
                stats.skipped += 1;
                *stats.skip_reasons.entry(reason).or_insert(0) += 1;
            }
        }
    }

    (observations, stats)
}
