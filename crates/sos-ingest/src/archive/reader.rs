//! Reference archive reader
//!
//! Parses `meta.xml` and reads every table by the column indices it
//! declares. Constant fields are filled in from their declared defaults.

use csv::ReaderBuilder;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use super::descriptor::{ArchiveDescriptor, TableDescriptor, DESCRIPTOR_FILE};
use super::terms::{DwcTerm, RowType};
use super::ArchiveError;

/// One data row as term IRI to value
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArchiveRow {
    pub values: BTreeMap<String, String>,
}

impl ArchiveRow {
    pub fn get(&self, term: DwcTerm) -> Option<&str> {
        self.values.get(&term.iri()).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveTable {
    pub row_type: Option<RowType>,
    pub location: String,
    pub rows: Vec<ArchiveRow>,
}

pub struct ArchiveReader {
    path: PathBuf,
    zip: ZipArchive<File>,
    descriptor: ArchiveDescriptor,
}

impl ArchiveReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let path = path.as_ref().to_path_buf();
        let mut zip = ZipArchive::new(File::open(&path)?)?;

        let mut xml = String::new();
        zip.by_name(DESCRIPTOR_FILE)?.read_to_string(&mut xml)?;
        let descriptor = ArchiveDescriptor::from_xml(&xml)?;

        Ok(Self {
            path,
            zip,
            descriptor,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn descriptor(&self) -> &ArchiveDescriptor {
        &self.descriptor
    }

    /// Content of the metadata document named by the descriptor
    pub fn metadata(&mut self) -> Result<Option<String>, ArchiveError> {
        let Some(name) = self.descriptor.metadata.clone() else {
            return Ok(None);
        };
        let mut content = String::new();
        self.zip.by_name(&name)?.read_to_string(&mut content)?;
        Ok(Some(content))
    }

    pub fn read_core(&mut self) -> Result<ArchiveTable, ArchiveError> {
        let core = self.descriptor.core.clone();
        self.read_table(&core)
    }

    pub fn read_extensions(&mut self) -> Result<Vec<ArchiveTable>, ArchiveError> {
        let extensions = self.descriptor.extensions.clone();
        extensions.iter().map(|table| self.read_table(table)).collect()
    }

    pub fn read_table(&mut self, table: &TableDescriptor) -> Result<ArchiveTable, ArchiveError> {
        let mut builder = ReaderBuilder::new();
        builder
            .delimiter(table.delimiter()?)
            .has_headers(false)
            .flexible(true);
        match table.quote()? {
            Some(quote) => builder.quote(quote),
            None => builder.quoting(false),
        };

        let entry = self.zip.by_name(table.location())?;
        let mut reader = builder.from_reader(entry);

        let mut rows = Vec::new();
        for record in reader.records().skip(table.ignore_header_lines) {
            let record = record?;
            let mut row = ArchiveRow::default();
            for field in &table.fields {
                let column = field.index.and_then(|i| record.get(i)).filter(|v| !v.is_empty());
                if let Some(value) = column.or(field.default.as_deref()) {
                    row.values.insert(field.term.clone(), value.to_string());
                } else if field.index.is_some() {
                    row.values.insert(field.term.clone(), String::new());
                }
            }
            rows.push(row);
        }

        Ok(ArchiveTable {
            row_type: RowType::from_iri(&table.row_type),
            location: table.location().to_string(),
            rows,
        })
    }
}
