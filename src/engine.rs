//! Drives one file through Reader → Aggregator → Finalizer → Reconciler
//! (spec §2 data flow), wiring the pieces with the actual error taxonomy
//! of §7.

use crate::aggregator::SectionAggregator;
use crate::config::Config;
use crate::error::IndexError;
use crate::finalize::finalize_file;
use crate::json_output::FileSummary;
use crate::reconcile::serialize::{parse_source_id, serialize_section, SectionRow};
use crate::record::{MseedRecordSource, RecordSource, Source};
use crate::store::Backend;
use crate::tolerance::{DefaultTolerances, Tolerances};

/// Everything produced by processing one file, before it reaches a store
/// or a JSON sink.
pub struct ProcessedFile {
    pub filename: String,
    pub rows: Vec<SectionRow>,
    pub summary: FileSummary,
}

pub struct Engine<'a> {
    config: &'a Config,
}

impl<'a> Engine<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Process one file end to end: decode its records, aggregate them
    /// into sections, finalize digests and extents, and serialize each
    /// section to a row. Does not touch any store; see [`Self::reconcile`].
    pub fn process_file(&self, source: Source, scan_time: i64, filename: String) -> Result<ProcessedFile, IndexError> {
        let file_mod_time = source.mod_time().map_err(IndexError::Io)?.unwrap_or(scan_time);

        let mut reader: MseedRecordSource<Box<dyn std::io::Read>> = crate::record::open_source(
            &source,
            self.config.skip_non_data,
            self.config.leap_second_file.clone(),
        )
        .map_err(IndexError::Io)?;

        let tolerances = DefaultTolerances::from_config(self.config);
        let mut aggregator = SectionAggregator::new(&tolerances, self.config.sub_index_interval_ns, file_mod_time);

        loop {
            match reader.next() {
                Ok(Some(record)) => {
                    aggregator.push(&record).map_err(|source| IndexError::Integrity {
                        path: filename.clone(),
                        source,
                    })?;
                }
                Ok(None) => break,
                Err(source) => {
                    return Err(IndexError::Decode {
                        path: filename.clone(),
                        source,
                    })
                }
            }
        }

        let skipped_any_bytes = reader.skipped_any_bytes;
        let (sections, file_digest) = aggregator.finish().map_err(|source| IndexError::Integrity {
            path: filename.clone(),
            source,
        })?;

        let extents = finalize_file(&sections, file_digest, skipped_any_bytes).ok_or_else(|| {
            IndexError::Integrity {
                path: filename.clone(),
                source: crate::aggregator::AggregateError::MissingExtents {
                    source_id: filename.clone(),
                },
            }
        })?;

        let mut rows = Vec::with_capacity(sections.len());
        for section in &sections {
            let identifier = parse_source_id(&section.source_id).map_err(|source| IndexError::Integrity {
                path: filename.clone(),
                source,
            })?;
            let row =
                serialize_section(section, &identifier, &filename, scan_time).map_err(|source| IndexError::ResourceExhausted {
                    path: filename.clone(),
                    source,
                })?;
            rows.push(row);
        }

        let path_modtime = source.mod_time().map_err(IndexError::Io)?;
        let summary = FileSummary::new(filename.clone(), &extents, path_modtime, scan_time, &sections);

        Ok(ProcessedFile { filename, rows, summary })
    }

    /// Reconcile one already-processed file's rows against a backend
    /// (spec §4.4). A no-op if `self.config.no_sync` is set.
    pub fn reconcile(&self, backend: &mut dyn Backend, processed: &mut ProcessedFile) -> Result<(), IndexError> {
        if self.config.no_sync {
            return Ok(());
        }
        backend.ensure_schema(&self.config.table).map_err(|source| IndexError::Store {
            path: processed.filename.clone(),
            source,
        })?;
        crate::reconcile::reconcile_file(
            backend,
            &self.config.table,
            &processed.filename,
            &mut processed.rows,
            processed.summary.earliest_ns,
            processed.summary.latest_ns,
            self.config.no_update,
        )
        .map_err(|source| IndexError::Store {
            path: processed.filename.clone(),
            source,
        })
    }
}
