//! Digest & Extent Finalizer.
//!
//! By the time a [`Section`] reaches this module its MD5 has already been
//! finalized by the [`crate::aggregator::SectionAggregator`] (the digest
//! accumulator is rolled incrementally as records are consumed, so there is
//! nothing left to hash here). What remains is purely computational:
//! deriving the file-level extents from the section list and pairing them
//! with the whole-file SHA-256 the aggregator also produced.

use crate::section::Section;

/// File-level summary produced once all of a file's sections are closed.
#[derive(Debug, Clone)]
pub struct FileExtents {
    pub earliest: i64,
    pub latest: i64,
    pub sha256: String,
    /// `false` once any byte range of the file was skipped as non-data
    /// (`skip_non_data`): the SHA-256 no longer covers every byte.
    pub digest_covers_whole_file: bool,
}

/// Compute file-level extents from a (possibly empty) section list and the
/// whole-file digest already computed by the aggregator.
pub fn finalize_file(sections: &[Section], sha256: String, skipped_any_bytes: bool) -> Option<FileExtents> {
    let earliest = sections.iter().map(|s| s.earliest).min()?;
    let latest = sections.iter().map(|s| s.latest).max()?;
    Some(FileExtents {
        earliest,
        latest,
        sha256,
        digest_covers_whole_file: !skipped_any_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section_with_extents(earliest: i64, latest: i64) -> Section {
        Section::open(
            "XX_STA01__BHZ".to_string(),
            1,
            2,
            0,
            511,
            earliest,
            latest,
            100.0,
            1_000,
            3600_000_000_000,
        )
    }

    #[test]
    fn extents_span_all_sections() {
        let sections = vec![
            section_with_extents(10, 20),
            section_with_extents(5, 15),
            section_with_extents(30, 40),
        ];
        let extents = finalize_file(&sections, "deadbeef".to_string(), false).unwrap();
        assert_eq!(extents.earliest, 5);
        assert_eq!(extents.latest, 40);
        assert!(extents.digest_covers_whole_file);
    }

    #[test]
    fn empty_file_has_no_extents() {
        assert!(finalize_file(&[], "deadbeef".to_string(), false).is_none());
    }

    #[test]
    fn skipped_bytes_flag_partial_coverage() {
        let sections = vec![section_with_extents(0, 10)];
        let extents = finalize_file(&sections, "deadbeef".to_string(), true).unwrap();
        assert!(!extents.digest_covers_whole_file);
    }
}
