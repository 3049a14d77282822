//! JSON-lines data directory
//!
//! Layout:
//!
//! ```text
//! <root>/
//!   providers/<provider_id>.jsonl   raw ProviderRecord per line
//!   taxa.jsonl                      BasicTaxon per line
//!   areas/<area_type>.jsonl         AreaFeature per line
//! ```
//!
//! Every provider line is one record: a line that does not decode is handed
//! on as a malformed placeholder so the run can count and skip it. Reference
//! files (taxa, areas) are strict and fail on the first bad line. A missing
//! area file means the area type has no features.
//!
//! Provider reads keep a per-provider cursor (record index and byte offset),
//! so consecutive pages seek straight to where the previous page ended.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_jsonlines::JsonLinesReader;
use sos_common::Page;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::framework::storage::{AreaSource, StoreError, TaxonSource, VerbatimSource};
use crate::providers::{ProviderId, ProviderRecord, VerbatimObservation};
use crate::taxonomy::BasicTaxon;
use crate::vocabulary::{AreaFeature, AreaType};

const PROVIDERS_DIR: &str = "providers";
const AREAS_DIR: &str = "areas";
const TAXA_FILE: &str = "taxa.jsonl";

/// Where the next unread provider record starts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Cursor {
    record: usize,
    offset: u64,
}

#[derive(Debug, Clone)]
pub struct JsonLinesDataDir {
    root: PathBuf,
    cursors: Arc<Mutex<HashMap<ProviderId, Cursor>>>,
}

impl JsonLinesDataDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cursors: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn provider_path(&self, provider_id: ProviderId) -> PathBuf {
        self.root
            .join(PROVIDERS_DIR)
            .join(format!("{}.jsonl", provider_id))
    }

    pub fn taxa_path(&self) -> PathBuf {
        self.root.join(TAXA_FILE)
    }

    pub fn area_path(&self, area_type: AreaType) -> PathBuf {
        self.root
            .join(AREAS_DIR)
            .join(format!("{}.jsonl", area_type))
    }

    /// Providers with a record file, ascending
    pub fn provider_ids(&self) -> Result<Vec<ProviderId>, StoreError> {
        let dir = self.root.join(PROVIDERS_DIR);
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            match path.file_stem().and_then(|s| s.to_str()).map(str::parse::<ProviderId>) {
                Some(Ok(id)) => ids.push(id),
                _ => warn!(path = %path.display(), "Ignoring provider file with non-numeric name"),
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }
}

fn is_decode_error(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::InvalidData | ErrorKind::UnexpectedEof)
}

/// Read the `page` window of provider records
///
/// Resumes from `resume` when it points at `page.skip`; otherwise skips
/// `page.skip` lines from the start without decoding them.
fn read_page(
    path: &Path,
    provider_id: ProviderId,
    page: Page,
    resume: Option<Cursor>,
) -> Result<(Vec<VerbatimObservation>, Cursor), StoreError> {
    let mut file = BufReader::new(File::open(path)?);
    let mut cursor = Cursor::default();
    match resume {
        Some(saved) if saved.record == page.skip => {
            file.seek(SeekFrom::Start(saved.offset))?;
            cursor = saved;
        }
        _ => {
            let mut line = Vec::new();
            while cursor.record < page.skip {
                line.clear();
                if file.read_until(b'\n', &mut line)? == 0 {
                    break;
                }
                cursor.record += 1;
            }
        }
    }

    let mut reader = JsonLinesReader::new(file);
    let mut records = Vec::with_capacity(page.take.min(4096));
    while records.len() < page.take {
        let line = cursor.record + 1;
        match reader.read::<ProviderRecord>() {
            Ok(Some(raw)) => records.push(raw.adapt(provider_id)),
            Ok(None) => break,
            Err(e) if is_decode_error(&e) => {
                warn!(path = %path.display(), line, error = %e, "Malformed provider record");
                records.push(VerbatimObservation::malformed(provider_id, line, e.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
        cursor.record += 1;
    }
    cursor.offset = reader.get_mut().stream_position()?;
    Ok((records, cursor))
}

/// Read every record of a reference file, failing on the first bad line
fn read_all<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    let mut records = Vec::new();
    for (index, item) in serde_jsonlines::json_lines::<T, _>(path)?.enumerate() {
        match item {
            Ok(record) => records.push(record),
            Err(e) if is_decode_error(&e) => {
                return Err(StoreError::Permanent(format!(
                    "{} line {}: {}",
                    path.display(),
                    index + 1,
                    e
                )));
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(records)
}

async fn blocking<T, F>(f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Permanent(format!("Blocking read task failed: {}", e)))?
}

#[async_trait]
impl VerbatimSource for JsonLinesDataDir {
    async fn get_batch(
        &self,
        provider_id: ProviderId,
        page: Page,
    ) -> Result<Vec<VerbatimObservation>, StoreError> {
        let path = self.provider_path(provider_id);
        let resume = self.cursors.lock().get(&provider_id).copied();
        let (records, cursor) =
            blocking(move || read_page(&path, provider_id, page, resume)).await?;
        self.cursors.lock().insert(provider_id, cursor);
        debug!(
            provider_id = %provider_id,
            skip = page.skip,
            records = records.len(),
            resumed = resume.is_some_and(|c| c.record == page.skip),
            "Read provider records"
        );
        Ok(records)
    }
}

#[async_trait]
impl TaxonSource for JsonLinesDataDir {
    async fn get_all_basic_taxa(&self) -> Result<Vec<BasicTaxon>, StoreError> {
        let path = self.taxa_path();
        blocking(move || read_all(&path)).await
    }
}

#[async_trait]
impl AreaSource for JsonLinesDataDir {
    async fn get_area_features(&self, area_type: AreaType) -> Result<Vec<AreaFeature>, StoreError> {
        let path = self.area_path(area_type);
        if !path.exists() {
            debug!(area_type = %area_type, "No area file, using empty mapping");
            return Ok(Vec::new());
        }
        blocking(move || read_all(&path)).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(path: &Path, lines: &[&str]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut file = std::fs::File::create(path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
    }

    fn mvm_line(id: usize) -> String {
        format!(
            r#"{{"provider":"mvm","recordId":"r{}","start":"2024-06-01","latitude":"59.1","longitude":"18.2"}}"#,
            id
        )
    }

    fn ids(records: &[VerbatimObservation]) -> Vec<&str> {
        records.iter().map(|v| v.source_record_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_malformed_lines_are_passed_on_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let data = JsonLinesDataDir::new(dir.path());
        let lines: Vec<String> = (0..5).map(mvm_line).collect();
        let mut with_garbage: Vec<&str> = lines.iter().map(String::as_str).collect();
        with_garbage.insert(2, "{not json");
        write_file(&data.provider_path(ProviderId(7)), &with_garbage);

        let first = data.get_batch(ProviderId(7), Page::first(3)).await.unwrap();
        assert_eq!(ids(&first), ["r0", "r1", "line:3"]);
        assert!(!first[0].is_malformed());
        assert!(first[2].is_malformed());
        assert_eq!(first[2].provider_id, ProviderId(7));

        let second = data.get_batch(ProviderId(7), Page::first(3).next()).await.unwrap();
        assert_eq!(ids(&second), ["r2", "r3", "r4"]);
        assert_eq!(second[0].provider_id, ProviderId(7));

        let third = data.get_batch(ProviderId(7), Page::new(6, 3)).await.unwrap();
        assert!(third.is_empty());

        assert_eq!(data.provider_ids().unwrap(), vec![ProviderId(7)]);
    }

    #[tokio::test]
    async fn test_consecutive_pages_resume_without_rescanning() {
        let dir = tempfile::tempdir().unwrap();
        let data = JsonLinesDataDir::new(dir.path());
        let path = data.provider_path(ProviderId(3));
        let lines: Vec<String> = (0..6).map(mvm_line).collect();
        write_file(&path, &lines.iter().map(String::as_str).collect::<Vec<_>>());

        let first = data.get_batch(ProviderId(3), Page::first(3)).await.unwrap();
        assert_eq!(ids(&first), ["r0", "r1", "r2"]);

        // Split the first line in two without moving any later byte. A read
        // that rescanned from the start would now be off by one line.
        let width = lines[0].len();
        let patch = format!("{{}}\n{}", "x".repeat(width - 3));
        let mut file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.write_all(patch.as_bytes()).unwrap();
        drop(file);

        let second = data.get_batch(ProviderId(3), Page::first(3).next()).await.unwrap();
        assert_eq!(ids(&second), ["r3", "r4", "r5"]);
    }

    #[tokio::test]
    async fn test_out_of_order_page_scans_from_start() {
        let dir = tempfile::tempdir().unwrap();
        let data = JsonLinesDataDir::new(dir.path());
        let lines: Vec<String> = (0..6).map(mvm_line).collect();
        write_file(
            &data.provider_path(ProviderId(3)),
            &lines.iter().map(String::as_str).collect::<Vec<_>>(),
        );

        let tail = data.get_batch(ProviderId(3), Page::new(4, 10)).await.unwrap();
        assert_eq!(ids(&tail), ["r4", "r5"]);

        // Going back to the start ignores the saved cursor
        let head = data.get_batch(ProviderId(3), Page::first(2)).await.unwrap();
        assert_eq!(ids(&head), ["r0", "r1"]);
    }

    #[tokio::test]
    async fn test_bad_taxa_line_fails_the_load() {
        let dir = tempfile::tempdir().unwrap();
        let data = JsonLinesDataDir::new(dir.path());
        write_file(
            &data.taxa_path(),
            &[
                r#"{"id":1,"parentId":null,"scientificName":"Animalia"}"#,
                r#"{"id":2,"parentId":1,"scien"#,
                r#"{"id":3,"parentId":2,"scientificName":"Parus major"}"#,
            ],
        );

        let err = crate::taxonomy::TaxonTreeLoader::load(&data).await.unwrap_err();
        match err {
            crate::taxonomy::TaxonomyError::Source(StoreError::Permanent(message)) => {
                assert!(message.contains("line 2"), "unexpected message: {}", message);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_reference_files() {
        let dir = tempfile::tempdir().unwrap();
        let data = JsonLinesDataDir::new(dir.path());
        write_file(
            &data.taxa_path(),
            &[
                r#"{"id":1,"parentId":null,"scientificName":"Animalia"}"#,
                r#"{"id":2,"parentId":1,"scientificName":"Aves"}"#,
            ],
        );
        write_file(
            &data.area_path(AreaType::County),
            &[r#"{"featureId":"1","name":"Stockholm"}"#],
        );

        let taxa = data.get_all_basic_taxa().await.unwrap();
        assert_eq!(taxa.len(), 2);
        assert_eq!(taxa[1].parent_id, Some(1));

        let counties = data.get_area_features(AreaType::County).await.unwrap();
        assert_eq!(counties[0].name, "Stockholm");
        assert!(data.get_area_features(AreaType::Parish).await.unwrap().is_empty());
    }
}
