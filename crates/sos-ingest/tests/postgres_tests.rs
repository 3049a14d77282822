//! PostgreSQL store against a live database
//!
//! Run with: DATABASE_URL=postgres://... cargo test --features database --test postgres_tests

#![cfg(feature = "database")]
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{coordinator, reference_data, verbatim, verbatim_records};
use sos_common::Page;
use sos_ingest::framework::{
    BatchConfig, Instance, ObservationReader, ObservationSink, ProviderDataAdmin, RunStatus,
    StoreError, WriteMode,
};
use sos_ingest::orchestrator::HarvestOrchestrator;
use sos_ingest::processor::{ObservationProcessor, ProcessedObservation};
use sos_ingest::providers::ProviderId;
use sos_ingest::storage::{InMemoryVerbatimSource, PgObservationStore};
use sqlx::PgPool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn observations(provider: u32, ids: std::ops::Range<usize>) -> Vec<ProcessedObservation> {
    let reference = reference_data();
    let processor = ObservationProcessor::new(
        reference.taxonomy.load(),
        reference.vocabulary.snapshot(),
    );
    ids.map(|i| processor.process(&verbatim(provider, i)).unwrap().observation)
        .collect()
}

async fn all_rows(store: &PgObservationStore, instance: Instance, page_size: usize) -> Vec<ProcessedObservation> {
    let mut rows = Vec::new();
    let mut page = Page::first(page_size);
    loop {
        let batch = store.get_processed_batch(instance, page).await.unwrap();
        let len = batch.len();
        rows.extend(batch);
        if len < page_size {
            return rows;
        }
        page = page.next();
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn test_write_many_upserts_by_id(pool: PgPool) -> Result<(), StoreError> {
    let store = PgObservationStore::new(pool);
    let mut batch = observations(1, 0..3);
    store.write_many(Instance::Blue, ProviderId(1), &batch).await?;

    batch[0].occurrence.remarks = Some("corrected".to_string());
    store.write_many(Instance::Blue, ProviderId(1), &batch[..1]).await?;

    let rows = all_rows(&store, Instance::Blue, 10).await;
    assert_eq!(rows.len(), 3);
    // An update keeps the row's original position
    assert_eq!(rows[0].id, batch[0].id);
    assert_eq!(rows[0].occurrence.remarks.as_deref(), Some("corrected"));
    assert_eq!(rows[2].id, batch[2].id);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
async fn test_delete_provider_data(pool: PgPool) -> Result<(), StoreError> {
    let store = PgObservationStore::new(pool);
    store.write_many(Instance::Green, ProviderId(1), &observations(1, 0..2)).await?;
    store.write_many(Instance::Green, ProviderId(2), &observations(2, 0..3)).await?;

    assert_eq!(store.delete_provider_data(ProviderId(1), Instance::Green).await?, 2);
    assert_eq!(store.provider_ids(Instance::Green).await?, vec![ProviderId(2)]);
    assert_eq!(store.delete_provider_data(ProviderId(1), Instance::Green).await?, 0);
    assert!(store.provider_ids(Instance::Blue).await?.is_empty());
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
async fn test_copy_then_activate_other_instance(pool: PgPool) -> Result<(), StoreError> {
    let store = PgObservationStore::new(pool);
    assert_eq!(store.active_instance().await?, Instance::Blue);

    store.write_many(Instance::Blue, ProviderId(1), &observations(1, 0..2)).await?;
    store.write_many(Instance::Blue, ProviderId(2), &observations(2, 0..3)).await?;
    // Stale shadow rows are replaced by the copy
    store.write_many(Instance::Green, ProviderId(2), &observations(2, 7..9)).await?;

    assert_eq!(store.copy_provider_data(ProviderId(2), Instance::Blue, Instance::Green).await?, 3);
    store.activate_instance(Instance::Green).await?;

    assert_eq!(store.active_instance().await?, Instance::Green);
    assert_eq!(store.inactive_instance().await?, Instance::Blue);
    assert_eq!(store.provider_ids(Instance::Green).await?, vec![ProviderId(2)]);

    let green: Vec<String> = all_rows(&store, Instance::Green, 10)
        .await
        .into_iter()
        .map(|o| o.source_record_id)
        .collect();
    assert_eq!(green, ["0", "1", "2"]);
    assert_eq!(all_rows(&store, Instance::Blue, 10).await.len(), 5);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
async fn test_pages_are_ordered_by_provider_then_write(pool: PgPool) -> Result<(), StoreError> {
    let store = PgObservationStore::new(pool);
    store.write_many(Instance::Blue, ProviderId(2), &observations(2, 0..3)).await?;
    store.write_many(Instance::Blue, ProviderId(1), &observations(1, 5..8)).await?;

    let ids: Vec<String> = all_rows(&store, Instance::Blue, 2)
        .await
        .into_iter()
        .map(|o| o.id)
        .collect();
    assert_eq!(
        ids,
        [
            "urn:lsid:sos:1:5",
            "urn:lsid:sos:1:6",
            "urn:lsid:sos:1:7",
            "urn:lsid:sos:2:0",
            "urn:lsid:sos:2:1",
            "urn:lsid:sos:2:2",
        ]
    );
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
async fn test_shadow_harvest_promotes_in_database(pool: PgPool) -> Result<(), StoreError> {
    let store = Arc::new(PgObservationStore::new(pool));
    store.write_many(Instance::Blue, ProviderId(2), &observations(2, 0..4)).await?;

    let source = InMemoryVerbatimSource::new().with_provider(ProviderId(1), verbatim_records(1, 5));
    let config = BatchConfig {
        write_mode: WriteMode::Shadow,
        ..BatchConfig::default()
    };
    let orchestrator = HarvestOrchestrator::new(Arc::new(coordinator(source, store.clone(), config)));

    let report = orchestrator
        .process(&[ProviderId(1)], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.get(ProviderId(1)).unwrap().status, RunStatus::Succeeded);
    assert_eq!(report.promoted, Some(Instance::Green));
    assert_eq!(store.active_instance().await?, Instance::Green);
    assert_eq!(
        store.provider_ids(Instance::Green).await?,
        vec![ProviderId(1), ProviderId(2)]
    );
    assert_eq!(all_rows(&store, Instance::Green, 3).await.len(), 9);
    Ok(())
}
