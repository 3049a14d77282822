//! Core types for harvest runs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::processor::SkipReason;
use crate::providers::ProviderId;
use crate::vocabulary::{AreaType, UnmappedTally};

/// Harvest run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
            RunStatus::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit record of one provider run
///
/// Created when the run starts and mutated only by the coordinator driving
/// that run.
#[derive(Debug, Clone, Serialize)]
pub struct HarvestInfo {
    pub id: Uuid,
    pub provider_id: ProviderId,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub items_read: u64,
    pub items_processed: u64,
    pub items_skipped: u64,
    pub skip_reasons: BTreeMap<SkipReason, u64>,
    pub unmapped_values: UnmappedTally,
    pub unknown_taxa: u64,
    pub invalid_individual_counts: u64,
    pub chunks_processed: u64,
    pub chunk_retries: u64,
    pub error_message: Option<String>,
}

impl HarvestInfo {
    pub fn start(provider_id: ProviderId) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider_id,
            status: RunStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            items_read: 0,
            items_processed: 0,
            items_skipped: 0,
            skip_reasons: BTreeMap::new(),
            unmapped_values: UnmappedTally::default(),
            unknown_taxa: 0,
            invalid_individual_counts: 0,
            chunks_processed: 0,
            chunk_retries: 0,
            error_message: None,
        }
    }

    pub fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.ended_at = Some(Utc::now());
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
        self.finish(RunStatus::Failed);
    }

    /// Fraction of read records that were skipped
    pub fn skip_rate(&self) -> f64 {
        if self.items_read == 0 {
            0.0
        } else {
            self.items_skipped as f64 / self.items_read as f64
        }
    }

    pub fn skipped_for(&self, reason: SkipReason) -> u64 {
        self.skip_reasons.get(&reason).copied().unwrap_or(0)
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.ended_at.map(|end| end - self.started_at)
    }
}

/// Where a run's output goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Upsert straight into the active instance
    #[default]
    Direct,
    /// Write to the inactive instance, then copy the rest and swap
    Shadow,
}

impl WriteMode {
    pub fn as_str(&self) -> &str {
        match self {
            WriteMode::Direct => "direct",
            WriteMode::Shadow => "shadow",
        }
    }
}

impl FromStr for WriteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "direct" => Ok(WriteMode::Direct),
            "shadow" => Ok(WriteMode::Shadow),
            other => Err(format!("Invalid write mode: {}", other)),
        }
    }
}

/// Configuration for batch processing
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub chunk_size: usize,
    /// Attempts per chunk fetch or write, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on every further retry
    pub retry_backoff: Duration,
    /// Providers processed concurrently
    pub worker_count: usize,
    /// Skip rate above which a finished run is reported with a warning
    pub skip_rate_warn_threshold: f64,
    pub write_mode: WriteMode,
    /// Area mappings every run needs loaded
    pub area_types: Vec<AreaType>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            max_attempts: 3,
            retry_backoff: Duration::from_millis(500),
            worker_count: 4,
            skip_rate_warn_threshold: 0.05,
            write_mode: WriteMode::Direct,
            area_types: vec![AreaType::County, AreaType::Municipality],
        }
    }
}

impl BatchConfig {
    /// Backoff before retry number `retry` (1-based)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        self.retry_backoff
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
    }
}
