//! `meta.xml` descriptor model
//!
//! The same serde model is used to write the descriptor and to read it back.

use serde::{Deserialize, Serialize};

use super::fields::FieldDescriptionSet;
use super::{ArchiveConfig, ArchiveError};

pub const TEXT_NS: &str = "http://rs.tdwg.org/dwc/text/";
pub const DESCRIPTOR_FILE: &str = "meta.xml";
const ENCODING: &str = "UTF-8";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveDescriptor {
    #[serde(rename = "@xmlns", default)]
    pub xmlns: String,
    #[serde(rename = "@metadata", default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    pub core: TableDescriptor,
    #[serde(rename = "extension", default)]
    pub extensions: Vec<TableDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    #[serde(rename = "@encoding")]
    pub encoding: String,
    #[serde(rename = "@fieldsTerminatedBy")]
    pub fields_terminated_by: String,
    #[serde(rename = "@linesTerminatedBy")]
    pub lines_terminated_by: String,
    #[serde(rename = "@fieldsEnclosedBy", default)]
    pub fields_enclosed_by: String,
    #[serde(rename = "@ignoreHeaderLines", default)]
    pub ignore_header_lines: usize,
    #[serde(rename = "@rowType")]
    pub row_type: String,
    pub files: Files,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<IndexElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coreid: Option<IndexElement>,
    #[serde(rename = "field", default)]
    pub fields: Vec<FieldElement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Files {
    pub location: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexElement {
    #[serde(rename = "@index")]
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldElement {
    #[serde(rename = "@index", default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(rename = "@term")]
    pub term: String,
    #[serde(rename = "@default", default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// Escape a delimiter for a descriptor attribute (`\t`, `\n`, `\r`)
pub fn escape_separator(raw: &str) -> String {
    raw.replace('\t', "\\t")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

pub fn unescape_separator(escaped: &str) -> String {
    escaped
        .replace("\\t", "\t")
        .replace("\\n", "\n")
        .replace("\\r", "\r")
}

impl TableDescriptor {
    /// Describe a staged table
    ///
    /// Core tables get an `<id>` element, extensions a `<coreid>` element.
    pub fn describe(
        location: &str,
        fields: &FieldDescriptionSet,
        config: &ArchiveConfig,
        is_core: bool,
    ) -> Result<Self, ArchiveError> {
        let id_index = fields.id_index().ok_or_else(|| {
            ArchiveError::InvalidFieldSet(format!("{} has no id column", location))
        })?;
        let id = IndexElement { index: id_index };

        let columns = fields.columns().enumerate().map(|(index, f)| FieldElement {
            index: Some(index),
            term: f.term.iri(),
            default: None,
        });
        let constants = fields.constants().map(|f| FieldElement {
            index: None,
            term: f.term.iri(),
            default: f.default_value.clone(),
        });

        Ok(Self {
            encoding: ENCODING.to_string(),
            fields_terminated_by: escape_separator(&char::from(config.delimiter).to_string()),
            lines_terminated_by: escape_separator(config.line_terminator.as_str()),
            fields_enclosed_by: char::from(config.quote).to_string(),
            ignore_header_lines: usize::from(config.include_header),
            row_type: fields.row_type().iri().to_string(),
            files: Files {
                location: location.to_string(),
            },
            id: is_core.then_some(id),
            coreid: (!is_core).then_some(id),
            fields: columns.chain(constants).collect(),
        })
    }

    pub fn location(&self) -> &str {
        &self.files.location
    }

    /// Index of the id (core) or coreid (extension) column
    pub fn id_index(&self) -> Option<usize> {
        self.id.or(self.coreid).map(|e| e.index)
    }

    pub fn delimiter(&self) -> Result<u8, ArchiveError> {
        single_byte(&unescape_separator(&self.fields_terminated_by), "fieldsTerminatedBy")
    }

    pub fn quote(&self) -> Result<Option<u8>, ArchiveError> {
        if self.fields_enclosed_by.is_empty() {
            Ok(None)
        } else {
            single_byte(&self.fields_enclosed_by, "fieldsEnclosedBy").map(Some)
        }
    }
}

fn single_byte(value: &str, attribute: &str) -> Result<u8, ArchiveError> {
    match value.as_bytes() {
        [byte] => Ok(*byte),
        _ => Err(ArchiveError::Descriptor(format!(
            "{} must be a single ASCII character, got {:?}",
            attribute, value
        ))),
    }
}

impl ArchiveDescriptor {
    pub fn new(core: TableDescriptor, extensions: Vec<TableDescriptor>, metadata: Option<String>) -> Self {
        Self {
            xmlns: TEXT_NS.to_string(),
            metadata,
            core,
            extensions,
        }
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableDescriptor> {
        std::iter::once(&self.core).chain(self.extensions.iter())
    }

    pub fn to_xml(&self) -> Result<String, ArchiveError> {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let mut serializer = quick_xml::se::Serializer::with_root(&mut xml, Some("archive"))
            .map_err(|e| ArchiveError::Descriptor(e.to_string()))?;
        serializer.indent(' ', 2);
        self.serialize(serializer)
            .map_err(|e| ArchiveError::Descriptor(e.to_string()))?;
        xml.push('\n');
        Ok(xml)
    }

    pub fn from_xml(xml: &str) -> Result<Self, ArchiveError> {
        quick_xml::de::from_str(xml)
            .map_err(|e| ArchiveError::Descriptor(format!("Failed to parse meta.xml: {}", e)))
    }
}
