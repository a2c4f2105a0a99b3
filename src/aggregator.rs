//! Section Aggregator — the core state machine (spec §4.2 of the original
//! design notes this crate implements). Consumes a record sequence for a
//! single file and emits a sequence of closed [`Section`]s, holding at most
//! one section open at a time.

use md5::{Digest, Md5};
use sha2::Sha256;
use thiserror::Error;

use crate::record::Record;
use crate::section::Section;
use crate::tolerance::Tolerances;

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("section for {source_id} closed with no time extents")]
    MissingExtents { source_id: String },

    #[error("source identifier {source_id:?} does not decompose into network/station/location/channel: {reason}")]
    SourceIdParse { source_id: String, reason: String },
}

struct OpenSection {
    section: Section,
    hasher: Md5,
    prev_start: i64,
}

/// Drives one file's records through the extend-or-close decision of
/// spec §4.2 and accumulates the whole-file SHA-256 alongside it.
pub struct SectionAggregator<'a, T: Tolerances> {
    tolerances: &'a T,
    sub_index_interval_ns: i64,
    file_mod_time: i64,
    open: Option<OpenSection>,
    finished: Vec<Section>,
    file_hasher: Sha256,
}

impl<'a, T: Tolerances> SectionAggregator<'a, T> {
    pub fn new(tolerances: &'a T, sub_index_interval_ns: i64, file_mod_time: i64) -> Self {
        Self {
            tolerances,
            sub_index_interval_ns,
            file_mod_time,
            open: None,
            finished: Vec::new(),
            file_hasher: Sha256::new(),
        }
    }

    /// Feed one decoded record into the aggregator.
    pub fn push(&mut self, record: &Record) -> Result<(), AggregateError> {
        self.file_hasher.update(&record.raw);

        let extends_open = match &self.open {
            Some(open) => {
                open.section.source_id == record.source_id
                    && open.section.pub_version == record.pub_version
                    && record.offset == open.section.end_offset + 1
            }
            None => false,
        };

        if extends_open {
            let open = self.open.as_mut().expect("checked above");
            let period_ns = if record.sample_rate > 0.0 {
                1_000_000_000.0 / record.sample_rate
            } else {
                0.0
            };
            let time_tolerance_ns = self.tolerances.time_tolerance_ns(period_ns);
            open.section.extend(
                record.offset + record.length as u64 - 1,
                record.start_ns,
                record.end_ns(),
                record.sample_rate,
                record.format_version,
                record.offset,
                open.prev_start,
                self.tolerances.rate_tolerance(),
                time_tolerance_ns,
                self.sub_index_interval_ns,
            );
            open.hasher.update(&record.raw);
            open.prev_start = record.start_ns;
        } else {
            self.close_open()?;
            let section = Section::open(
                record.source_id.clone(),
                record.pub_version,
                record.format_version,
                record.offset,
                record.offset + record.length as u64 - 1,
                record.start_ns,
                record.end_ns(),
                record.sample_rate,
                self.file_mod_time,
                self.sub_index_interval_ns,
            );
            let mut hasher = Md5::new();
            hasher.update(&record.raw);
            self.open = Some(OpenSection {
                section,
                hasher,
                prev_start: record.start_ns,
            });
        }

        Ok(())
    }

    fn close_open(&mut self) -> Result<(), AggregateError> {
        if let Some(open) = self.open.take() {
            let OpenSection { mut section, hasher, .. } = open;
            section.digest = hex::encode(hasher.finalize());
            self.finished.push(section);
        }
        Ok(())
    }

    /// Close any open section and return the finished section list plus
    /// the whole-file SHA-256 digest, consuming the aggregator.
    pub fn finish(mut self) -> Result<(Vec<Section>, String), AggregateError> {
        self.close_open()?;
        let file_digest = hex::encode(self.file_hasher.finalize());
        Ok((self.finished, file_digest))
    }
}
