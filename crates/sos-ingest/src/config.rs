//! Configuration management

use anyhow::Context;
use std::str::FromStr;
use std::time::Duration;

use crate::archive::{ArchiveConfig, LineTerminator};
use crate::framework::{BatchConfig, WriteMode};
use crate::vocabulary::AreaType;

// ============================================================================
// Harvest Configuration Constants
// ============================================================================

/// Default number of records fetched, processed and written per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default attempts per chunk fetch or write, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the first retry, in milliseconds.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;

/// Default number of providers harvested concurrently.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Default skip rate above which a run is reported with a warning.
pub const DEFAULT_SKIP_RATE_WARN_THRESHOLD: f64 = 0.05;

/// Default culture for vocabulary labels.
pub const DEFAULT_CULTURE: &str = "sv-SE";

/// Default area types loaded for every run.
pub const DEFAULT_AREA_TYPES: &str = "county,municipality";

// ============================================================================
// Archive Configuration Constants
// ============================================================================

pub const DEFAULT_ARCHIVE_DELIMITER: char = ',';

pub const DEFAULT_ARCHIVE_QUOTE: char = '"';

pub const DEFAULT_ARCHIVE_LINE_TERMINATOR: &str = "lf";

pub const DEFAULT_ARCHIVE_INCLUDE_HEADER: bool = true;

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Harvest and export configuration
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub batch: BatchConfig,
    pub culture: String,
    pub archive: ArchiveConfig,
    /// Canonical store connection; in-memory store when absent
    pub database_url: Option<String>,
    pub database_max_connections: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch: BatchConfig {
                chunk_size: DEFAULT_CHUNK_SIZE,
                max_attempts: DEFAULT_MAX_ATTEMPTS,
                retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
                worker_count: DEFAULT_WORKER_COUNT,
                skip_rate_warn_threshold: DEFAULT_SKIP_RATE_WARN_THRESHOLD,
                write_mode: WriteMode::Direct,
                area_types: vec![AreaType::County, AreaType::Municipality],
            },
            culture: DEFAULT_CULTURE.to_string(),
            archive: ArchiveConfig::default(),
            database_url: None,
            database_max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
        }
    }
}

impl IngestConfig {
    /// Load configuration from `.env`, the environment and defaults
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            batch: BatchConfig {
                chunk_size: parse_or(&get, "SOS_CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?,
                max_attempts: parse_or(&get, "SOS_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?,
                retry_backoff: Duration::from_millis(parse_or(
                    &get,
                    "SOS_RETRY_BACKOFF_MS",
                    DEFAULT_RETRY_BACKOFF_MS,
                )?),
                worker_count: parse_or(&get, "SOS_WORKER_COUNT", DEFAULT_WORKER_COUNT)?,
                skip_rate_warn_threshold: parse_or(
                    &get,
                    "SOS_SKIP_RATE_WARN_THRESHOLD",
                    DEFAULT_SKIP_RATE_WARN_THRESHOLD,
                )?,
                write_mode: parse_or(&get, "SOS_WRITE_MODE", WriteMode::Direct)?,
                area_types: parse_area_types(
                    &get("SOS_AREA_TYPES").unwrap_or_else(|| DEFAULT_AREA_TYPES.to_string()),
                )?,
            },
            culture: get("SOS_CULTURE").unwrap_or_else(|| DEFAULT_CULTURE.to_string()),
            archive: ArchiveConfig {
                delimiter: parse_separator(
                    &get("SOS_ARCHIVE_DELIMITER").unwrap_or_else(|| DEFAULT_ARCHIVE_DELIMITER.to_string()),
                    "SOS_ARCHIVE_DELIMITER",
                )?,
                quote: parse_separator(
                    &get("SOS_ARCHIVE_QUOTE").unwrap_or_else(|| DEFAULT_ARCHIVE_QUOTE.to_string()),
                    "SOS_ARCHIVE_QUOTE",
                )?,
                line_terminator: parse_or(
                    &get,
                    "SOS_ARCHIVE_LINE_TERMINATOR",
                    LineTerminator::from_str(DEFAULT_ARCHIVE_LINE_TERMINATOR)
                        .map_err(anyhow::Error::msg)?,
                )?,
                include_header: parse_or(
                    &get,
                    "SOS_ARCHIVE_INCLUDE_HEADER",
                    DEFAULT_ARCHIVE_INCLUDE_HEADER,
                )?,
            },
            database_url: get("DATABASE_URL"),
            database_max_connections: parse_or(
                &get,
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_DATABASE_MAX_CONNECTIONS,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.batch.chunk_size == 0 {
            anyhow::bail!("Chunk size must be greater than 0");
        }

        if self.batch.max_attempts == 0 {
            anyhow::bail!("Max attempts must be at least 1");
        }

        if self.batch.worker_count == 0 {
            anyhow::bail!("Worker count must be greater than 0");
        }

        if !(0.0..=1.0).contains(&self.batch.skip_rate_warn_threshold) {
            anyhow::bail!(
                "Skip rate warning threshold ({}) must be between 0 and 1",
                self.batch.skip_rate_warn_threshold
            );
        }

        if self.culture.trim().is_empty() {
            anyhow::bail!("Culture cannot be empty");
        }

        if self.database_max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        self.archive
            .validate()
            .context("Invalid archive configuration")?;

        Ok(())
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.batch.chunk_size = chunk_size;
        self
    }

    pub fn with_write_mode(mut self, write_mode: WriteMode) -> Self {
        self.batch.write_mode = write_mode;
        self
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.batch.worker_count = worker_count;
        self
    }

    pub fn with_culture(mut self, culture: impl Into<String>) -> Self {
        self.culture = culture.into();
        self
    }

    pub fn with_archive(mut self, archive: ArchiveConfig) -> Self {
        self.archive = archive;
        self
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| anyhow::anyhow!("Invalid value {:?} for {}: {}", raw, key, e)),
        None => Ok(default),
    }
}

fn parse_area_types(raw: &str) -> anyhow::Result<Vec<AreaType>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<AreaType>().map_err(anyhow::Error::msg))
        .collect::<anyhow::Result<Vec<_>>>()
        .context("Invalid SOS_AREA_TYPES")
}

/// Single ASCII separator; `\t` and `tab` mean a tab
fn parse_separator(raw: &str, key: &str) -> anyhow::Result<u8> {
    match raw {
        "\\t" | "tab" | "\t" => Ok(b'\t'),
        _ => match raw.as_bytes() {
            [byte] if byte.is_ascii() => Ok(*byte),
            _ => anyhow::bail!("{} must be a single ASCII character, got {:?}", key, raw),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = IngestConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.batch.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.batch.write_mode, WriteMode::Direct);
        assert_eq!(config.batch.area_types, vec![AreaType::County, AreaType::Municipality]);
        assert_eq!(config.culture, "sv-SE");
        assert_eq!(config.archive, ArchiveConfig::default());
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = IngestConfig::from_lookup(lookup(&[
            ("SOS_CHUNK_SIZE", "250"),
            ("SOS_WRITE_MODE", "shadow"),
            ("SOS_AREA_TYPES", "county, parish"),
            ("SOS_ARCHIVE_DELIMITER", "\\t"),
            ("SOS_ARCHIVE_LINE_TERMINATOR", "crlf"),
            ("SOS_ARCHIVE_INCLUDE_HEADER", "false"),
        ]))
        .unwrap();
        assert_eq!(config.batch.chunk_size, 250);
        assert_eq!(config.batch.write_mode, WriteMode::Shadow);
        assert_eq!(config.batch.area_types, vec![AreaType::County, AreaType::Parish]);
        assert_eq!(config.archive.delimiter, b'\t');
        assert_eq!(config.archive.line_terminator, LineTerminator::Crlf);
        assert!(!config.archive.include_header);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(IngestConfig::from_lookup(lookup(&[("SOS_CHUNK_SIZE", "lots")])).is_err());
        assert!(IngestConfig::from_lookup(lookup(&[("SOS_CHUNK_SIZE", "0")])).is_err());
        assert!(IngestConfig::from_lookup(lookup(&[("SOS_AREA_TYPES", "county,galaxy")])).is_err());
        assert!(IngestConfig::from_lookup(lookup(&[("SOS_ARCHIVE_QUOTE", ",")])).is_err());
    }
}
