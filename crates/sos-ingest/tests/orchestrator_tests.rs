//! Multi-provider harvests and blue/green promotion

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{coordinator, init_test_logging, sample_taxa, verbatim_records, FaultyStore, WriteFault};
use sos_ingest::framework::{BatchConfig, Instance, ProviderDataAdmin, RunStatus, WriteMode};
use sos_ingest::orchestrator::HarvestOrchestrator;
use sos_ingest::providers::ProviderId;
use sos_ingest::storage::{InMemoryObservationStore, InMemoryTaxonSource, InMemoryVerbatimSource};
use sos_ingest::taxonomy::BasicTaxon;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn shadow_config() -> BatchConfig {
    BatchConfig {
        write_mode: WriteMode::Shadow,
        ..BatchConfig::default()
    }
}

/// Providers 1, 2 and 3 harvested into the active (blue) instance
async fn seeded_store() -> Arc<InMemoryObservationStore> {
    let store = Arc::new(InMemoryObservationStore::new());
    let source = InMemoryVerbatimSource::new()
        .with_provider(ProviderId(1), verbatim_records(1, 5))
        .with_provider(ProviderId(2), verbatim_records(2, 3))
        .with_provider(ProviderId(3), verbatim_records(3, 2));
    let orchestrator = HarvestOrchestrator::new(Arc::new(coordinator(
        source,
        store.clone(),
        BatchConfig::default(),
    )));

    let report = orchestrator
        .process(&[ProviderId(1), ProviderId(2), ProviderId(3)], &CancellationToken::new())
        .await
        .unwrap();
    assert!(report.all_succeeded());
    assert!(report.promoted.is_none());
    store
}

#[tokio::test]
async fn test_direct_harvest_runs_every_provider() {
    init_test_logging();

    let mut source = InMemoryVerbatimSource::new();
    for provider in 1..=5 {
        source.insert(ProviderId(provider), verbatim_records(provider, 12));
    }
    let store = Arc::new(InMemoryObservationStore::new());
    let config = BatchConfig {
        worker_count: 2,
        ..BatchConfig::default()
    };
    let orchestrator = HarvestOrchestrator::new(Arc::new(coordinator(source, store.clone(), config)));

    let providers: Vec<ProviderId> = (1..=5).rev().map(ProviderId).chain([ProviderId(3)]).collect();
    let report = orchestrator.process(&providers, &CancellationToken::new()).await.unwrap();

    let ids: Vec<u32> = report.runs.iter().map(|run| run.provider_id.0).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    assert!(report.all_succeeded());
    assert_eq!(store.total(Instance::Blue), 60);
}

#[tokio::test]
async fn test_shadow_harvest_promotes_and_carries_untouched_providers() {
    init_test_logging();
    let store = seeded_store().await;

    // Provider 1 grew, provider 4 is new, providers 2 and 3 are not harvested
    let source = InMemoryVerbatimSource::new()
        .with_provider(ProviderId(1), verbatim_records(1, 8))
        .with_provider(ProviderId(4), verbatim_records(4, 4));
    let orchestrator = HarvestOrchestrator::new(Arc::new(coordinator(source, store.clone(), shadow_config())));

    let report = orchestrator
        .process(&[ProviderId(1), ProviderId(4)], &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.all_succeeded());
    assert_eq!(report.promoted, Some(Instance::Green));
    assert_eq!(store.active_instance().await.unwrap(), Instance::Green);
    assert_eq!(store.count(Instance::Green, ProviderId(1)), 8);
    assert_eq!(store.count(Instance::Green, ProviderId(2)), 3);
    assert_eq!(store.count(Instance::Green, ProviderId(3)), 2);
    assert_eq!(store.count(Instance::Green, ProviderId(4)), 4);

    // The previous generation is left untouched
    assert_eq!(store.count(Instance::Blue, ProviderId(1)), 5);
    assert_eq!(store.count(Instance::Blue, ProviderId(4)), 0);
}

#[tokio::test]
async fn test_failed_provider_keeps_previous_data_after_promotion() {
    let inner = seeded_store().await;
    let store = Arc::new(FaultyStore::new(inner.clone(), WriteFault::Provider(ProviderId(3))));
    let source = InMemoryVerbatimSource::new()
        .with_provider(ProviderId(1), verbatim_records(1, 6))
        .with_provider(ProviderId(3), verbatim_records(3, 9));
    let orchestrator = HarvestOrchestrator::new(Arc::new(coordinator(source, store, shadow_config())));

    let report = orchestrator
        .process(&[ProviderId(1), ProviderId(3)], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.get(ProviderId(1)).unwrap().status, RunStatus::Succeeded);
    assert_eq!(report.get(ProviderId(3)).unwrap().status, RunStatus::Failed);
    assert_eq!(report.promoted, Some(Instance::Green));
    assert_eq!(inner.count(Instance::Green, ProviderId(1)), 6);
    assert_eq!(inner.count(Instance::Green, ProviderId(2)), 3);
    assert_eq!(inner.count(Instance::Green, ProviderId(3)), 2);
}

#[tokio::test]
async fn test_no_promotion_when_every_provider_fails() {
    let inner = seeded_store().await;
    let store = Arc::new(FaultyStore::new(inner.clone(), WriteFault::AlwaysPermanent));
    let source = InMemoryVerbatimSource::new().with_provider(ProviderId(1), verbatim_records(1, 6));
    let orchestrator = HarvestOrchestrator::new(Arc::new(coordinator(source, store, shadow_config())));

    let report = orchestrator
        .process(&[ProviderId(1)], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.count(RunStatus::Failed), 1);
    assert!(report.promoted.is_none());
    assert_eq!(inner.active_instance().await.unwrap(), Instance::Blue);
    assert_eq!(inner.count(Instance::Blue, ProviderId(1)), 5);
}

#[tokio::test]
async fn test_canceled_shadow_harvest_is_not_promoted() {
    let store = seeded_store().await;
    let source = InMemoryVerbatimSource::new().with_provider(ProviderId(1), verbatim_records(1, 6));
    let orchestrator = HarvestOrchestrator::new(Arc::new(coordinator(source, store.clone(), shadow_config())));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = orchestrator.process(&[ProviderId(1)], &cancel).await.unwrap();

    assert_eq!(report.count(RunStatus::Canceled), 1);
    assert!(report.promoted.is_none());
    assert_eq!(store.active_instance().await.unwrap(), Instance::Blue);
}

#[tokio::test]
async fn test_refresh_taxonomy_keeps_previous_tree_on_failure() {
    let store = Arc::new(InMemoryObservationStore::new());
    let orchestrator = HarvestOrchestrator::new(Arc::new(coordinator(
        InMemoryVerbatimSource::new(),
        store,
        BatchConfig::default(),
    )));
    let taxonomy = &orchestrator.coordinator().reference().taxonomy;
    assert_eq!(taxonomy.generation(), 1);

    let cyclic = InMemoryTaxonSource::new(vec![
        BasicTaxon::new(1, None, "Animalia"),
        BasicTaxon::new(2, Some(1), "Aves"),
        BasicTaxon::new(3, Some(2), "Parus"),
        BasicTaxon::new(1, Some(3), "Animalia"),
    ]);
    let err = orchestrator.refresh_taxonomy(&cyclic).await.unwrap_err();
    assert!(err.is_configuration_error());
    assert_eq!(taxonomy.generation(), 1);
    assert!(taxonomy.load().contains(3));

    let mut taxa = sample_taxa();
    taxa.push(BasicTaxon::new(4, Some(2), "Cyanistes caeruleus"));
    let generation = orchestrator
        .refresh_taxonomy(&InMemoryTaxonSource::new(taxa))
        .await
        .unwrap();
    assert_eq!(generation, 2);
    assert!(taxonomy.load().contains(4));
}
