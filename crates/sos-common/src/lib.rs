//! SOS Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the SOS harvest workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`SosError`] and the [`Result`] alias
//! - **Logging**: `tracing` subscriber setup driven by [`logging::LogConfig`]
//! - **Checksums**: SHA-256 digests for delivered archive files
//! - **Types**: Pagination primitive shared by sources and readers
//!
//! # Example
//!
//! ```no_run
//! use sos_common::checksum::sha256_file;
//!
//! fn report(path: &str) -> sos_common::Result<()> {
//!     let digest = sha256_file(path)?;
//!     tracing::info!(%digest, "Archive checksum");
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{Result, SosError};
pub use types::Page;
