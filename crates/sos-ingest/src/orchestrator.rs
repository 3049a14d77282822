//! Harvest orchestrator
//!
//! Runs several providers concurrently, at most `worker_count` at a time.
//! Every provider run is isolated: one failing provider never stops the
//! others. In shadow mode all providers write to the inactive instance and
//! the instance is activated once, after every run has ended.

use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::error::Result;
use crate::framework::storage::{Instance, TaxonSource};
use crate::framework::{BatchCoordinator, HarvestInfo, RunStatus, WriteMode};
use crate::providers::ProviderId;
use crate::taxonomy::{TaxonTreeLoader, TaxonomyError};

/// Outcome of one orchestrated harvest
#[derive(Debug, Clone)]
pub struct HarvestReport {
    /// One run per requested provider, sorted by provider id
    pub runs: Vec<HarvestInfo>,
    /// Instance activated at the end of a shadow harvest
    pub promoted: Option<Instance>,
}

impl HarvestReport {
    pub fn get(&self, provider_id: ProviderId) -> Option<&HarvestInfo> {
        self.runs.iter().find(|run| run.provider_id == provider_id)
    }

    pub fn all_succeeded(&self) -> bool {
        self.runs.iter().all(|run| run.status == RunStatus::Succeeded)
    }

    pub fn count(&self, status: RunStatus) -> usize {
        self.runs.iter().filter(|run| run.status == status).count()
    }
}

pub struct HarvestOrchestrator {
    coordinator: Arc<BatchCoordinator>,
}

impl HarvestOrchestrator {
    pub fn new(coordinator: Arc<BatchCoordinator>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &Arc<BatchCoordinator> {
        &self.coordinator
    }

    /// Harvest every provider in `providers`
    #[instrument(skip(self, providers, cancel), fields(providers = providers.len()))]
    pub async fn process(
        &self,
        providers: &[ProviderId],
        cancel: &CancellationToken,
    ) -> Result<HarvestReport> {
        let providers: BTreeSet<ProviderId> = providers.iter().copied().collect();
        let config = self.coordinator.config();
        info!(
            mode = config.write_mode.as_str(),
            workers = config.worker_count,
            "Starting harvest"
        );

        let report = match config.write_mode {
            WriteMode::Direct => HarvestReport {
                runs: self.run_direct(&providers, cancel).await,
                promoted: None,
            },
            WriteMode::Shadow => self.run_shadow(&providers, cancel).await?,
        };

        info!(
            succeeded = report.count(RunStatus::Succeeded),
            failed = report.count(RunStatus::Failed),
            canceled = report.count(RunStatus::Canceled),
            promoted = ?report.promoted,
            "Harvest finished"
        );
        Ok(report)
    }

    async fn run_direct(
        &self,
        providers: &BTreeSet<ProviderId>,
        cancel: &CancellationToken,
    ) -> Vec<HarvestInfo> {
        let config = self.coordinator.config();
        let mut runs: Vec<HarvestInfo> = stream::iter(providers.iter().copied())
            .map(|provider_id| self.coordinator.run(provider_id, config.chunk_size, cancel))
            .buffer_unordered(config.worker_count.max(1))
            .collect()
            .await;
        runs.sort_by_key(|run| run.provider_id);
        runs
    }

    async fn run_shadow(
        &self,
        providers: &BTreeSet<ProviderId>,
        cancel: &CancellationToken,
    ) -> Result<HarvestReport> {
        let config = self.coordinator.config();
        let store = self.coordinator.store();
        let active = store.active_instance().await?;
        let target = active.other();

        let mut runs: Vec<HarvestInfo> = stream::iter(providers.iter().copied())
            .map(|provider_id| async move {
                if let Err(e) = store.delete_provider_data(provider_id, target).await {
                    error!(provider_id = %provider_id, error = %e, "Failed to clear shadow data");
                    let mut info = HarvestInfo::start(provider_id);
                    info.fail(format!("Failed to clear provider data in {}: {}", target, e));
                    return info;
                }
                self.coordinator
                    .run_into(provider_id, config.chunk_size, target, cancel)
                    .await
            })
            .buffer_unordered(config.worker_count.max(1))
            .collect()
            .await;
        runs.sort_by_key(|run| run.provider_id);

        if cancel.is_cancelled() {
            warn!(instance = %target, "Harvest canceled, leaving shadow instance inactive");
            return Ok(HarvestReport {
                runs,
                promoted: None,
            });
        }

        let succeeded: BTreeSet<ProviderId> = runs
            .iter()
            .filter(|run| run.status == RunStatus::Succeeded)
            .map(|run| run.provider_id)
            .collect();
        if succeeded.is_empty() {
            warn!("No provider succeeded, keeping {} active", active);
            return Ok(HarvestReport {
                runs,
                promoted: None,
            });
        }

        for run in runs.iter().filter(|run| run.status != RunStatus::Succeeded) {
            warn!(provider_id = %run.provider_id, status = %run.status, "Restoring previous provider data");
        }

        // Failed providers are not in `succeeded`, so their previous data is copied back too
        self.coordinator.promote(active, target, &succeeded).await?;
        info!(instance = %target, providers = succeeded.len(), "Activated shadow instance");

        Ok(HarvestReport {
            runs,
            promoted: Some(target),
        })
    }

    /// Rebuild the taxon tree from `source` and publish it
    ///
    /// Returns the new tree generation. When the build fails the previous
    /// tree stays published.
    pub async fn refresh_taxonomy(&self, source: &dyn TaxonSource) -> std::result::Result<u64, TaxonomyError> {
        let tree = TaxonTreeLoader::load(source).await.map_err(|e| {
            error!(error = %e, "Taxon tree rebuild failed, keeping previous tree");
            e
        })?;
        let taxa = tree.len();
        let generation = self.coordinator.reference().taxonomy.publish(tree);
        info!(generation, taxa, "Published taxon tree");
        Ok(generation)
    }

    /// Refetch every loaded area mapping and publish them as one generation
    pub async fn refresh_areas(&self) -> Result<u64> {
        let generation = self
            .coordinator
            .reference()
            .vocabulary
            .rebuild_areas(self.coordinator.areas().as_ref())
            .await?;
        Ok(generation)
    }
}
