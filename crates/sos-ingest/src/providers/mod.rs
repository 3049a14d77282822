//! Source adapters
//!
//! Every harvested provider delivers records in its own shape. A raw record is
//! carried as one variant of [`ProviderRecord`], and each variant has exactly
//! one adapter function that turns it into the common [`VerbatimObservation`].
//! Nothing past this module knows a provider's raw schema.

pub mod artportalen;
pub mod mvm;
pub mod nors;
pub mod verbatim;

pub use verbatim::{VerbatimMeasurement, VerbatimMedia, VerbatimObservation};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Numeric data provider identifier
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ProviderId(pub u32);

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProviderId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ProviderId)
    }
}

/// Which adapter a provider's records go through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Artportalen,
    Nors,
    Mvm,
}

impl ProviderKind {
    pub fn as_str(&self) -> &str {
        match self {
            ProviderKind::Artportalen => "artportalen",
            ProviderKind::Nors => "nors",
            ProviderKind::Mvm => "mvm",
        }
    }
}

/// A harvested data source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataProvider {
    pub id: ProviderId,
    /// Stable short identifier, e.g. "Artportalen"
    pub identifier: String,
    pub name: String,
    pub kind: ProviderKind,
}

/// Raw provider record, tagged by the provider that produced it
///
/// Serialized with a `"provider"` tag so a mixed JSON-lines stream can be
/// read without knowing the provider up front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum ProviderRecord {
    Artportalen(artportalen::Sighting),
    Nors(nors::FishObservation),
    Mvm(mvm::MvmObservation),
}

impl ProviderRecord {
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderRecord::Artportalen(_) => ProviderKind::Artportalen,
            ProviderRecord::Nors(_) => ProviderKind::Nors,
            ProviderRecord::Mvm(_) => ProviderKind::Mvm,
        }
    }

    /// Translate into the common verbatim shape
    pub fn adapt(self, provider_id: ProviderId) -> VerbatimObservation {
        match self {
            ProviderRecord::Artportalen(sighting) => artportalen::adapt(provider_id, sighting),
            ProviderRecord::Nors(observation) => nors::adapt(provider_id, observation),
            ProviderRecord::Mvm(observation) => mvm::adapt(provider_id, observation),
        }
    }
}

/// Format an optional number as a raw string field
pub(crate) fn number_field<T: ToString>(value: Option<T>) -> Option<String> {
    value.map(|v| v.to_string())
}
