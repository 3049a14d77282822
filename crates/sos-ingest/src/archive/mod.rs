//! Darwin Core Archive codec
//!
//! Writes processed observations as a Darwin Core Archive: one zip file
//! holding a core table, optional extension tables, the `meta.xml`
//! descriptor and a caller-supplied metadata document. A reference reader
//! parses an archive back into term/value rows.
//!
//! # Example
//!
//! ```no_run
//! use sos_ingest::archive::{ArchiveConfig, ArchiveWriter, FieldDescriptionSet, MetadataDocument};
//!
//! # fn main() -> Result<(), sos_ingest::archive::ArchiveError> {
//! let writer = ArchiveWriter::create(
//!     "/tmp/dwca.zip",
//!     ArchiveConfig::default(),
//!     FieldDescriptionSet::default_core(),
//! )?;
//! let summary = writer.finish(&MetadataDocument::new("eml.xml", "<eml/>"))?;
//! assert_eq!(summary.core_rows, 0);
//! # Ok(())
//! # }
//! ```

pub mod descriptor;
pub mod export;
pub mod fields;
pub mod reader;
pub mod table;
pub mod terms;
pub mod writer;

pub use descriptor::ArchiveDescriptor;
pub use export::{ArchiveExporter, ExportRequest, ExportSummary};
pub use fields::{ArchiveRecord, FieldDescription, FieldDescriptionSet};
pub use reader::{ArchiveReader, ArchiveRow, ArchiveTable};
pub use terms::{DwcTerm, RowType};
pub use writer::{ArchiveSummary, ArchiveWriter};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::framework::storage::StoreError;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Invalid descriptor: {0}")]
    Descriptor(String),

    #[error("Destination is already being written: {}", .0.display())]
    DestinationBusy(PathBuf),

    #[error("Invalid field set: {0}")]
    InvalidFieldSet(String),

    #[error("Invalid archive configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid metadata document: {0}")]
    InvalidMetadata(String),

    #[error("Archive export canceled")]
    Canceled,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Checksum error: {0}")]
    Checksum(#[from] sos_common::SosError),
}

/// Extension tables supported next to the occurrence core
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionKind {
    MeasurementOrFact,
    Multimedia,
}

impl ExtensionKind {
    pub fn row_type(&self) -> RowType {
        match self {
            ExtensionKind::MeasurementOrFact => RowType::MeasurementOrFact,
            ExtensionKind::Multimedia => RowType::Multimedia,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ExtensionKind::MeasurementOrFact => "mof",
            ExtensionKind::Multimedia => "multimedia",
        }
    }

    pub fn default_fields(&self) -> FieldDescriptionSet {
        match self {
            ExtensionKind::MeasurementOrFact => FieldDescriptionSet::default_measurement_or_fact(),
            ExtensionKind::Multimedia => FieldDescriptionSet::default_multimedia(),
        }
    }
}

impl FromStr for ExtensionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mof" | "measurementorfact" | "measurement_or_fact" => Ok(ExtensionKind::MeasurementOrFact),
            "multimedia" | "media" => Ok(ExtensionKind::Multimedia),
            other => Err(format!("Unknown extension: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineTerminator {
    #[default]
    Lf,
    Crlf,
}

impl LineTerminator {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineTerminator::Lf => "\n",
            LineTerminator::Crlf => "\r\n",
        }
    }
}

impl FromStr for LineTerminator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lf" | "\\n" => Ok(LineTerminator::Lf),
            "crlf" | "\\r\\n" => Ok(LineTerminator::Crlf),
            other => Err(format!("Invalid line terminator: {}", other)),
        }
    }
}

/// Text format of the archive's tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveConfig {
    pub delimiter: u8,
    pub quote: u8,
    pub line_terminator: LineTerminator,
    pub include_header: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            line_terminator: LineTerminator::Lf,
            include_header: true,
        }
    }
}

impl ArchiveConfig {
    pub fn validate(&self) -> Result<(), ArchiveError> {
        for (name, byte) in [("delimiter", self.delimiter), ("quote", self.quote)] {
            if !byte.is_ascii() || byte == b'\r' || byte == b'\n' {
                return Err(ArchiveError::InvalidConfig(format!(
                    "{} must be an ASCII character other than CR or LF",
                    name
                )));
            }
        }
        if self.delimiter == self.quote {
            return Err(ArchiveError::InvalidConfig(
                "Delimiter and quote must differ".to_string(),
            ));
        }
        Ok(())
    }
}

/// Caller-supplied metadata document stored next to the descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataDocument {
    pub file_name: String,
    pub content: String,
}

impl MetadataDocument {
    pub fn new(file_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(ArchiveConfig::default().validate().is_ok());
        let same = ArchiveConfig {
            quote: b',',
            ..ArchiveConfig::default()
        };
        assert!(matches!(same.validate(), Err(ArchiveError::InvalidConfig(_))));
        let newline = ArchiveConfig {
            delimiter: b'\n',
            ..ArchiveConfig::default()
        };
        assert!(newline.validate().is_err());
    }

    #[test]
    fn test_extension_parse() {
        assert_eq!("MoF".parse::<ExtensionKind>(), Ok(ExtensionKind::MeasurementOrFact));
        assert_eq!("multimedia".parse::<ExtensionKind>(), Ok(ExtensionKind::Multimedia));
        assert!("audio".parse::<ExtensionKind>().is_err());
    }
}
