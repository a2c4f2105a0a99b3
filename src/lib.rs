//! # miniseed-index — miniSEED corpus indexing engine
//!
//! Indexes a corpus of miniSEED files into a queryable summary store:
//! streams each file's records, groups adjacent same-channel records into
//! contiguous sections, finalizes per-section and per-file content
//! digests, and reconciles the result against a PostgreSQL or SQLite
//! table in one atomic transaction per file.

pub mod aggregator;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod finalize;
pub mod json_output;
pub mod listfile;
pub mod logging;
pub mod pathcanon;
pub mod reconcile;
pub mod record;
pub mod section;
pub mod store;
pub mod tolerance;

// Flat re-exports for the most common types.
pub use config::{BackendConfig, Config};
pub use engine::{Engine, ProcessedFile};
pub use error::{IndexError, Result};
pub use record::{MseedRecordSource, Record, RecordSource, Source};
pub use section::{Section, Span, TimeIndexEntry};
