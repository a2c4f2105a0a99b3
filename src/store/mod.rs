//! Backend contract shared by the two store implementations (spec §6):
//! a network SQL backend ([`postgres`]) and an embedded file backend
//! ([`sqlite`]), both driven by the same serialization rules.

pub mod postgres;
pub mod sqlite;

use thiserror::Error;

use crate::reconcile::serialize::SectionRow;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("connecting to the store: {0}")]
    Connect(String),
    #[error("preparing a statement: {0}")]
    Prepare(String),
    #[error("executing a statement: {0}")]
    Execute(String),
    #[error("committing a transaction: {0}")]
    Commit(String),
}

/// How a filename is matched against existing rows (spec §4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilenameClause {
    /// `<base>#<n>` was detected: match `filename LIKE '<base>#%'`.
    Prefix(String),
    /// No version suffix: match the filename exactly.
    Exact(String),
}

/// Split a filename into its matching clause, recognizing the `<base>#<n>`
/// version-suffix convention (spec §4.4).
pub fn filename_clause(filename: &str) -> FilenameClause {
    if let Some(hash_pos) = filename.rfind('#') {
        let suffix = &filename[hash_pos + 1..];
        if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) {
            return FilenameClause::Prefix(filename[..=hash_pos].to_string());
        }
    }
    FilenameClause::Exact(filename.to_string())
}

/// Nanosecond time-range narrowing clause (spec §4.4), matching the
/// nanosecond `starttime`/`endtime` columns: `starttime <= max_start` and
/// `endtime >= min_end`.
#[derive(Debug, Clone, Copy)]
pub struct TimeWindow {
    pub max_start: i64,
    pub min_end: i64,
}

/// `(network, station, location, channel, pub_version, digest, updated)` —
/// the minimal projection needed to evaluate the preservation rule without
/// transferring whole rows back.
#[derive(Debug, Clone)]
pub struct PreservationCandidate {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub pub_version: u8,
    pub digest: String,
    pub updated: i64,
}

/// A backing store capable of the Reconciler's single-transaction
/// replace-by-filename operation.
pub trait Backend {
    /// Query rows matching `clause` and `window`, projected down to the
    /// preservation key. Not called in no-update mode.
    fn preservation_candidates(
        &mut self,
        table: &str,
        clause: &FilenameClause,
        window: TimeWindow,
    ) -> Result<Vec<PreservationCandidate>, StoreError>;

    /// Delete every row matching `clause` and `window`, then insert `rows`,
    /// all within one transaction. In no-update mode the delete step (and
    /// the preservation query that would have preceded it) is skipped by
    /// the caller, not by the backend; `replace` itself is always atomic
    /// for whichever of delete/insert it is asked to perform.
    fn replace(
        &mut self,
        table: &str,
        clause: &FilenameClause,
        window: TimeWindow,
        rows: &[SectionRow],
        skip_delete: bool,
    ) -> Result<(), StoreError>;

    /// Create the table and indexes described in spec §6 if they do not
    /// already exist. A no-op against a pre-existing network SQL table.
    fn ensure_schema(&mut self, table: &str) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versioned_filename_is_prefix_clause() {
        assert_eq!(
            filename_clause("/a/b.dat#2"),
            FilenameClause::Prefix("/a/b.dat#".to_string())
        );
    }

    #[test]
    fn plain_filename_is_exact_clause() {
        assert_eq!(
            filename_clause("/a/b.dat"),
            FilenameClause::Exact("/a/b.dat".to_string())
        );
    }

    #[test]
    fn hash_without_trailing_digits_is_not_versioned() {
        assert_eq!(
            filename_clause("/a/b#final.dat"),
            FilenameClause::Exact("/a/b#final.dat".to_string())
        );
    }
}
