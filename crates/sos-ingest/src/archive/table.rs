//! Delimited table staging
//!
//! Rows are streamed into an anonymous temporary file so a table is never
//! held in memory; the file is copied into the container on finish.

use csv::{QuoteStyle, Terminator, WriterBuilder};
use std::fs::File;
use std::io::{Seek, SeekFrom};

use super::fields::{ArchiveRecord, FieldDescriptionSet};
use super::{ArchiveConfig, ArchiveError, LineTerminator};

pub struct TableWriter {
    location: String,
    fields: FieldDescriptionSet,
    writer: csv::Writer<File>,
    rows: u64,
}

impl TableWriter {
    pub fn new(
        location: impl Into<String>,
        fields: FieldDescriptionSet,
        config: &ArchiveConfig,
    ) -> Result<Self, ArchiveError> {
        let file = tempfile::tempfile()?;
        let terminator = match config.line_terminator {
            LineTerminator::Lf => Terminator::Any(b'\n'),
            LineTerminator::Crlf => Terminator::CRLF,
        };
        let mut writer = WriterBuilder::new()
            .delimiter(config.delimiter)
            .quote(config.quote)
            .quote_style(QuoteStyle::Necessary)
            .double_quote(true)
            .terminator(terminator)
            .has_headers(false)
            .from_writer(file);

        if config.include_header {
            writer.write_record(fields.header())?;
        }

        Ok(Self {
            location: location.into(),
            fields,
            writer,
            rows: 0,
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn fields(&self) -> &FieldDescriptionSet {
        &self.fields
    }

    /// Data rows written so far, excluding the header
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn write(&mut self, record: &impl ArchiveRecord) -> Result<(), ArchiveError> {
        self.writer.write_record(self.fields.row(record))?;
        self.rows += 1;
        Ok(())
    }

    /// Flush and return the staged file, rewound to its start
    pub fn into_file(self) -> Result<File, ArchiveError> {
        let mut file = self
            .writer
            .into_inner()
            .map_err(|e| ArchiveError::Io(e.into_error()))?;
        file.seek(SeekFrom::Start(0))?;
        Ok(file)
    }
}
