//! The data a Section accumulates while it is open, before the Finalizer
//! turns it into a row-ready summary.

/// One entry in a section's sparse time index: the file-byte offset at
/// which a record starting at or after `time_ns` begins. Built at a
/// configurable interval (`sub_index_interval_ns`) rather than per-record,
/// to keep the serialized column bounded for long sections.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeIndexEntry {
    pub time_ns: i64,
    pub byte_offset: u64,
}

/// A maximal run of sample coverage within a section whose records are
/// contiguous in time under the configured tolerance, at a single nominal
/// sample rate. Zero-rate records never contribute a span.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub start_ns: i64,
    pub end_ns: i64,
    pub sample_rate: f64,
}

/// Everything the Aggregator tracks while a section is accepting records.
/// One `Section` corresponds to one eventual output row.
#[derive(Debug, Clone)]
pub struct Section {
    pub source_id: String,
    pub pub_version: u8,

    pub start_offset: u64,
    pub end_offset: u64,

    pub earliest: i64,
    pub latest: i64,

    /// Zero iff any record in the section disagreed with the first
    /// record's format version.
    pub format_version: u8,
    pub nom_samprate: f64,

    pub rate_mismatch: bool,
    pub time_order: bool,

    pub time_index: Vec<TimeIndexEntry>,
    pub spans: Vec<Span>,

    /// File modification time at section open; may be overwritten by the
    /// Reconciler's preservation rule.
    pub updated_at: i64,

    /// Lowercase 32-hex MD5 over the section's raw record bytes, set once
    /// the section is closed and finalized.
    pub digest: String,

    next_index_time: i64,
}

impl Section {
    /// Open a new section from its first record.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        source_id: String,
        pub_version: u8,
        format_version: u8,
        start_offset: u64,
        end_offset: u64,
        start_ns: i64,
        end_ns: i64,
        sample_rate: f64,
        file_mod_time: i64,
        sub_index_interval_ns: i64,
    ) -> Self {
        let mut section = Self {
            source_id,
            pub_version,
            start_offset,
            end_offset,
            earliest: start_ns,
            latest: end_ns,
            format_version,
            nom_samprate: sample_rate,
            rate_mismatch: false,
            time_order: true,
            time_index: vec![TimeIndexEntry {
                time_ns: start_ns,
                byte_offset: start_offset,
            }],
            spans: Vec::new(),
            updated_at: file_mod_time,
            digest: String::new(),
            next_index_time: start_ns + sub_index_interval_ns,
        };
        section.advance_index_threshold(end_ns, sub_index_interval_ns);
        if sample_rate != 0.0 {
            section.spans.push(Span {
                start_ns,
                end_ns,
                sample_rate,
            });
        }
        section
    }

    fn advance_index_threshold(&mut self, end_ns: i64, sub_index_interval_ns: i64) {
        while end_ns > self.next_index_time {
            self.next_index_time += sub_index_interval_ns;
        }
    }

    /// Extend this section with a record already confirmed to share its
    /// `(source_id, pub_version)` and be byte-contiguous (spec §4.2 step 1).
    #[allow(clippy::too_many_arguments)]
    pub fn extend(
        &mut self,
        end_offset: u64,
        start_ns: i64,
        end_ns: i64,
        sample_rate: f64,
        format_version: u8,
        byte_offset: u64,
        prev_start: i64,
        rate_tolerance: f64,
        time_tolerance_ns: i64,
        sub_index_interval_ns: i64,
    ) {
        self.end_offset = end_offset;
        self.earliest = self.earliest.min(start_ns);
        self.latest = self.latest.max(end_ns);

        if self.nom_samprate != 0.0 && (1.0 - self.nom_samprate / sample_rate).abs() >= rate_tolerance {
            self.rate_mismatch = true;
        }
        if self.format_version != format_version {
            self.format_version = 0;
        }
        if start_ns <= prev_start {
            self.time_order = false;
        }
        if end_ns > self.next_index_time {
            self.time_index.push(TimeIndexEntry {
                time_ns: start_ns,
                byte_offset,
            });
            self.advance_index_threshold(end_ns, sub_index_interval_ns);
        }

        if sample_rate != 0.0 {
            self.merge_span(start_ns, end_ns, sample_rate, time_tolerance_ns);
        }
    }

    fn merge_span(&mut self, start_ns: i64, end_ns: i64, sample_rate: f64, time_tolerance_ns: i64) {
        if let Some(last) = self.spans.last_mut() {
            let period_ns = if last.sample_rate > 0.0 {
                (1_000_000_000.0 / last.sample_rate).round() as i64
            } else {
                0
            };
            let predicted = last.end_ns + period_ns;
            if (start_ns - predicted).abs() <= time_tolerance_ns {
                last.end_ns = last.end_ns.max(end_ns);
                last.sample_rate = sample_rate;
                return;
            }
        }
        self.spans.push(Span {
            start_ns,
            end_ns,
            sample_rate,
        });
    }
}
