//! End-to-end harvest from a JSON-lines data directory into an archive

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::init_test_logging;
use sos_ingest::archive::{
    ArchiveConfig, ArchiveExporter, ArchiveReader, DwcTerm, ExportRequest, ExtensionKind,
    MetadataDocument,
};
use sos_ingest::framework::{BatchConfig, BatchCoordinator, ReferenceData, RunStatus};
use sos_ingest::orchestrator::HarvestOrchestrator;
use sos_ingest::processor::SkipReason;
use sos_ingest::providers::ProviderId;
use sos_ingest::storage::{InMemoryObservationStore, JsonLinesDataDir};
use sos_ingest::taxonomy::TaxonTreeLoader;
use sos_ingest::vocabulary::{AreaType, VocabularyResolver};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn write_lines(path: &Path, lines: &[&str]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, lines.join("\n") + "\n").unwrap();
}

fn seed(data: &JsonLinesDataDir) {
    write_lines(
        &data.taxa_path(),
        &[
            r#"{"id":1,"parentId":null,"scientificName":"Animalia"}"#,
            r#"{"id":2,"parentId":1,"scientificName":"Aves"}"#,
            r#"{"id":3,"parentId":2,"scientificName":"Parus major"}"#,
        ],
    );
    write_lines(
        &data.area_path(AreaType::County),
        &[
            r#"{"featureId":"1","name":"Stockholm","geometry":{"type":"Polygon","coordinates":[[[17.0,59.0],[19.0,59.0],[19.0,60.0],[17.0,60.0],[17.0,59.0]]]}}"#,
        ],
    );
    write_lines(
        &data.provider_path(ProviderId(1)),
        &[
            r#"{"provider":"mvm","recordId":"m1","start":"2024-06-01","latitude":"59.3","longitude":"18.1","dyntaxaId":"3","sex":"female"}"#,
            r#"{"provider":"mvm","recordId":"m2","latitude":"59.3","longitude":"18.1"}"#,
            "{truncated",
            r#"{"provider":"mvm","recordId":"m3","start":"2024-06-02T10:00:00Z","latitude":"59.4","longitude":"18.2","remarks":"two, \"singing\""}"#,
        ],
    );
    write_lines(
        &data.provider_path(ProviderId(2)),
        &[
            r#"{"provider":"artportalen","sightingId":501,"startDate":"2024-05-12","startTime":"06:15","site":{"xCoord":674000.0,"yCoord":6580000.0,"accuracy":50},"taxonId":3,"observers":["A. Andersson"],"media":[{"url":"https://media.example.org/501.jpg","fileType":"image/jpeg"}]}"#,
        ],
    );
}

#[tokio::test]
async fn test_data_directory_to_archive() {
    init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let data = Arc::new(JsonLinesDataDir::new(dir.path().join("data")));
    seed(&data);

    let tree = TaxonTreeLoader::load(data.as_ref()).await.unwrap();
    assert_eq!(tree.len(), 3);
    let reference = Arc::new(ReferenceData::new(
        tree,
        VocabularyResolver::with_static_vocabularies("sv-SE"),
    ));
    let store = Arc::new(InMemoryObservationStore::new());
    let config = BatchConfig {
        chunk_size: 2,
        ..BatchConfig::default()
    };
    let coordinator = BatchCoordinator::new(data.clone(), store.clone(), data.clone(), reference, config);
    let orchestrator = HarvestOrchestrator::new(Arc::new(coordinator));

    let providers = data.provider_ids().unwrap();
    assert_eq!(providers, vec![ProviderId(1), ProviderId(2)]);
    let report = orchestrator.process(&providers, &CancellationToken::new()).await.unwrap();

    let mvm = report.get(ProviderId(1)).unwrap();
    assert_eq!(mvm.status, RunStatus::Succeeded);
    assert_eq!(mvm.items_read, 4);
    assert_eq!(mvm.items_processed, 2);
    assert_eq!(mvm.items_skipped, 2);
    assert_eq!(mvm.skipped_for(SkipReason::MissingEventDate), 1);
    assert_eq!(mvm.skipped_for(SkipReason::MalformedRecord), 1);

    let artportalen = report.get(ProviderId(2)).unwrap();
    assert_eq!(artportalen.status, RunStatus::Succeeded);
    assert_eq!(artportalen.items_processed, 1);

    let destination = dir.path().join("out").join("dwca.zip");
    std::fs::create_dir_all(destination.parent().unwrap()).unwrap();
    let request = ExportRequest::new(&destination, MetadataDocument::new("eml.xml", "<eml/>"))
        .with_extension(ExtensionKind::Multimedia);
    let summary = ArchiveExporter::new(store, ArchiveConfig::default())
        .export(request, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.core_rows, 3);
    assert_eq!(summary.extension_rows.get(&ExtensionKind::Multimedia), Some(&1));

    let mut reader = ArchiveReader::open(&destination).unwrap();
    let core = reader.read_core().unwrap();
    let m3 = core
        .rows
        .iter()
        .find(|row| row.get(DwcTerm::OccurrenceId) == Some("urn:lsid:sos:1:m3"))
        .unwrap();
    assert_eq!(m3.get(DwcTerm::OccurrenceRemarks), Some("two, \"singing\""));

    let sighting = core
        .rows
        .iter()
        .find(|row| row.get(DwcTerm::OccurrenceId) == Some("urn:lsid:sos:2:501"))
        .unwrap();
    assert_eq!(sighting.get(DwcTerm::County), Some("Stockholm"));
    assert_eq!(sighting.get(DwcTerm::ScientificName), Some("Parus major"));
    assert_eq!(sighting.get(DwcTerm::RecordedBy), Some("A. Andersson"));
}
