//! Export of the active store instance as a Darwin Core Archive

use sos_common::Page;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::fields::FieldDescriptionSet;
use super::writer::ArchiveWriter;
use super::{ArchiveConfig, ArchiveError, ExtensionKind, MetadataDocument};
use crate::framework::storage::{Instance, ObservationStore};

/// What to export and where
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub destination: PathBuf,
    pub core_fields: FieldDescriptionSet,
    pub extensions: Vec<(ExtensionKind, FieldDescriptionSet)>,
    pub metadata: MetadataDocument,
    pub page_size: usize,
}

impl ExportRequest {
    /// Default core and no extensions
    pub fn new(destination: impl Into<PathBuf>, metadata: MetadataDocument) -> Self {
        Self {
            destination: destination.into(),
            core_fields: FieldDescriptionSet::default_core(),
            extensions: Vec::new(),
            metadata,
            page_size: 1000,
        }
    }

    /// Add an extension with its default field set
    pub fn with_extension(mut self, kind: ExtensionKind) -> Self {
        self.extensions.push((kind, kind.default_fields()));
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub instance: Instance,
    pub core_rows: u64,
    pub extension_rows: BTreeMap<ExtensionKind, u64>,
    /// Hex SHA-256 of the archive file
    pub sha256: String,
}

pub struct ArchiveExporter {
    store: Arc<dyn ObservationStore>,
    config: ArchiveConfig,
}

impl ArchiveExporter {
    pub fn new(store: Arc<dyn ObservationStore>, config: ArchiveConfig) -> Self {
        Self { store, config }
    }

    /// Write every processed observation of the active instance to an archive
    ///
    /// Pages are written on the blocking pool. Cancellation is checked before
    /// each row; a canceled export leaves no file behind.
    #[instrument(skip(self, request, cancel), fields(destination = %request.destination.display()))]
    pub async fn export(
        &self,
        request: ExportRequest,
        cancel: &CancellationToken,
    ) -> Result<ExportSummary, ArchiveError> {
        let instance = self.store.active_instance().await?;
        info!(instance = %instance, "Exporting archive");

        let mut writer = ArchiveWriter::create(&request.destination, self.config.clone(), request.core_fields)?;
        for (kind, fields) in request.extensions {
            writer = writer.with_extension(kind, fields)?;
        }

        let mut page = Page::first(request.page_size.max(1));
        loop {
            let batch = self.store.get_processed_batch(instance, page).await?;
            let is_last = page.is_last(batch.len());
            let cancel = cancel.clone();
            writer = blocking(move || {
                for observation in &batch {
                    if cancel.is_cancelled() {
                        warn!(rows = writer.core_rows(), "Archive export canceled");
                        writer.abort()?;
                        return Err(ArchiveError::Canceled);
                    }
                    writer.write_observation(observation)?;
                }
                Ok(writer)
            })
            .await?;
            if is_last {
                break;
            }
            page = page.next();
        }

        let metadata = request.metadata;
        let (summary, sha256) = blocking(move || {
            let summary = writer.finish(&metadata)?;
            let sha256 = sos_common::checksum::sha256_file(&summary.path)?;
            Ok((summary, sha256))
        })
        .await?;

        info!(core_rows = summary.core_rows, %sha256, "Archive export finished");
        Ok(ExportSummary {
            path: summary.path,
            instance,
            core_rows: summary.core_rows,
            extension_rows: summary.extension_rows,
            sha256,
        })
    }
}

/// Run archive file work off the async executor
async fn blocking<T, F>(f: F) -> Result<T, ArchiveError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ArchiveError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ArchiveError::Io(std::io::Error::other(e)))?
}
