//! Top-level error type — every component error converts into this.
//!
//! Mirrors the teacher's per-module error enums (`CodecError`,
//! `SuperblockError`, `CryptoError`) composed at the call site: no local
//! recovery is attempted anywhere, every fallible function returns a
//! `Result` propagated with `?` up to a single top-level handler in
//! `main()` that prints `ERROR: ...` and exits non-zero.

use thiserror::Error;

use crate::aggregator::AggregateError;
use crate::reconcile::serialize::SerializeError;
use crate::record::ReadError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum IndexError {
    /// Fatal for the current file; the Reconciler is not invoked.
    #[error("decode error in {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: ReadError,
    },

    /// Missing extents, a source-id parse failure, or a span list producing
    /// more than one trace identity within a section.
    #[error("integrity error in {path}: {source}")]
    Integrity {
        path: String,
        #[source]
        source: AggregateError,
    },

    /// Serialized column data (timeindex/timespans) exceeded the soft cap,
    /// or an allocation-sized structure could not be built.
    #[error("resource exhaustion in {path}: {source}")]
    ResourceExhausted {
        path: String,
        #[source]
        source: SerializeError,
    },

    /// Connect, prepare, execute, or commit failure against the backing store.
    #[error("store error in {path}: {source}")]
    Store {
        path: String,
        #[source]
        source: StoreError,
    },

    /// Unknown flag, missing required value, or no inputs — fatal at startup.
    #[error("argument error: {0}")]
    Argument(String),

    /// Plain I/O failure outside the record-decode path (opening a file,
    /// writing the JSON sink, loading a list-file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IndexError>;
