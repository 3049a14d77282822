//! Archive writer
//!
//! The container is assembled in `<destination>.partial`, created
//! exclusively so only one writer can target a destination at a time, and
//! renamed into place once complete. On any failure, or when the writer is
//! dropped unfinished, the partial file is removed.

use std::collections::{BTreeMap, HashSet};
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::descriptor::{ArchiveDescriptor, TableDescriptor, DESCRIPTOR_FILE};
use super::fields::{FieldDescriptionSet, Linked};
use super::table::TableWriter;
use super::terms::{DwcTerm, RowType};
use super::{ArchiveConfig, ArchiveError, ExtensionKind, MetadataDocument};
use crate::processor::ProcessedObservation;

/// Removes the partial container on drop unless disarmed
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), error = %e, "Failed to remove partial archive");
                }
            }
        }
    }
}

/// Outcome of a finished archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    pub core_rows: u64,
    pub extension_rows: BTreeMap<ExtensionKind, u64>,
}

pub struct ArchiveWriter {
    // Declared first so it is dropped last, after the open handles below
    partial: PartialFile,
    destination: PathBuf,
    container: File,
    config: ArchiveConfig,
    core: TableWriter,
    extensions: Vec<(ExtensionKind, TableWriter)>,
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = OsString::from(destination.as_os_str());
    name.push(".partial");
    PathBuf::from(name)
}

impl ArchiveWriter {
    /// Claim `destination` and start staging the core table
    pub fn create(
        destination: impl AsRef<Path>,
        config: ArchiveConfig,
        core_fields: FieldDescriptionSet,
    ) -> Result<Self, ArchiveError> {
        config.validate()?;
        if core_fields.row_type() != RowType::Occurrence {
            return Err(ArchiveError::InvalidFieldSet(format!(
                "Core row type must be {}",
                RowType::Occurrence.iri()
            )));
        }

        let destination = destination.as_ref().to_path_buf();
        let path = partial_path(&destination);
        let container = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(ArchiveError::DestinationBusy(destination))
            }
            Err(e) => return Err(e.into()),
        };
        let partial = PartialFile { path, armed: true };

        let core = TableWriter::new(RowType::Occurrence.file_name(), core_fields, &config)?;
        debug!(destination = %destination.display(), "Started archive");

        Ok(Self {
            partial,
            destination,
            container,
            config,
            core,
            extensions: Vec::new(),
        })
    }

    /// Add an extension table
    ///
    /// The field set must match the extension's row type and be keyed by
    /// `occurrenceID`; each kind may be added once.
    pub fn with_extension(
        mut self,
        kind: ExtensionKind,
        fields: FieldDescriptionSet,
    ) -> Result<Self, ArchiveError> {
        if fields.row_type() != kind.row_type() {
            return Err(ArchiveError::InvalidFieldSet(format!(
                "Field set for {} has row type {}",
                kind.as_str(),
                fields.row_type().iri()
            )));
        }
        if fields.id_term() != DwcTerm::OccurrenceId {
            return Err(ArchiveError::InvalidFieldSet(format!(
                "Extension {} must be keyed by occurrenceID",
                kind.as_str()
            )));
        }
        if self.extensions.iter().any(|(existing, _)| *existing == kind) {
            return Err(ArchiveError::InvalidFieldSet(format!(
                "Extension {} added twice",
                kind.as_str()
            )));
        }

        let table = TableWriter::new(kind.row_type().file_name(), fields, &self.config)?;
        self.extensions.push((kind, table));
        Ok(self)
    }

    /// Write the core row and every extension row of one observation
    pub fn write_observation(&mut self, observation: &ProcessedObservation) -> Result<(), ArchiveError> {
        self.core.write(observation)?;

        let core_id = observation.occurrence.occurrence_id.as_str();
        for (kind, table) in &mut self.extensions {
            match kind {
                ExtensionKind::MeasurementOrFact => {
                    for record in &observation.measurements {
                        table.write(&Linked { core_id, record })?;
                    }
                }
                ExtensionKind::Multimedia => {
                    for record in &observation.multimedia {
                        table.write(&Linked { core_id, record })?;
                    }
                }
            }
        }
        Ok(())
    }

    pub fn core_rows(&self) -> u64 {
        self.core.rows()
    }

    /// Assemble the container and move it into place
    pub fn finish(self, metadata: &MetadataDocument) -> Result<ArchiveSummary, ArchiveError> {
        let mut partial = self.partial;
        validate_metadata(metadata, &self.core, &self.extensions)?;

        let core_descriptor =
            TableDescriptor::describe(self.core.location(), self.core.fields(), &self.config, true)?;
        let extension_descriptors = self
            .extensions
            .iter()
            .map(|(_, table)| TableDescriptor::describe(table.location(), table.fields(), &self.config, false))
            .collect::<Result<Vec<_>, _>>()?;
        let descriptor = ArchiveDescriptor::new(
            core_descriptor,
            extension_descriptors,
            Some(metadata.file_name.clone()),
        );
        let xml = descriptor.to_xml()?;

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut zip = ZipWriter::new(self.container);

        zip.start_file(DESCRIPTOR_FILE, options)?;
        zip.write_all(xml.as_bytes())?;

        zip.start_file(metadata.file_name.as_str(), options)?;
        zip.write_all(metadata.content.as_bytes())?;

        let core_rows = self.core.rows();
        copy_table(&mut zip, self.core, options)?;

        let mut extension_rows = BTreeMap::new();
        for (kind, table) in self.extensions {
            extension_rows.insert(kind, table.rows());
            copy_table(&mut zip, table, options)?;
        }

        let container = zip.finish()?;
        container.sync_all()?;
        drop(container);

        std::fs::rename(&partial.path, &self.destination)?;
        partial.disarm();

        info!(
            destination = %self.destination.display(),
            core_rows,
            extensions = extension_rows.len(),
            "Archive written"
        );
        Ok(ArchiveSummary {
            path: self.destination,
            core_rows,
            extension_rows,
        })
    }

    /// Discard everything written so far and release the destination
    pub fn abort(self) -> Result<(), ArchiveError> {
        let mut partial = self.partial;
        drop(self.container);
        std::fs::remove_file(&partial.path)?;
        partial.disarm();
        debug!(destination = %self.destination.display(), "Archive aborted");
        Ok(())
    }
}

fn copy_table(
    zip: &mut ZipWriter<File>,
    table: TableWriter,
    options: SimpleFileOptions,
) -> Result<(), ArchiveError> {
    let location = table.location().to_string();
    let mut staged = table.into_file()?;
    zip.start_file(location.as_str(), options)?;
    io::copy(&mut staged, zip)?;
    Ok(())
}

fn validate_metadata(
    metadata: &MetadataDocument,
    core: &TableWriter,
    extensions: &[(ExtensionKind, TableWriter)],
) -> Result<(), ArchiveError> {
    let name = metadata.file_name.as_str();
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(ArchiveError::InvalidMetadata(format!(
            "Invalid metadata file name: {:?}",
            name
        )));
    }

    let taken: HashSet<&str> = std::iter::once(DESCRIPTOR_FILE)
        .chain(std::iter::once(core.location()))
        .chain(extensions.iter().map(|(_, t)| t.location()))
        .collect();
    if taken.contains(name) {
        return Err(ArchiveError::InvalidMetadata(format!(
            "Metadata file name {} collides with an archive entry",
            name
        )));
    }
    Ok(())
}
