//! Optional JSON summary sink (spec §4.6): one document describing every
//! file processed in a run, independent of whether any store backend is
//! configured.

use std::fs::File;
use std::io::{self, Write};

use chrono::{SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::finalize::FileExtents;
use crate::section::Section;

/// `format_version = 2 -> application/vnd.fdsn.mseed;version=2`,
/// `= 3 -> ;version=3`, anything else falls back to the bare media type.
pub fn content_type_for(format_version: u8) -> String {
    match format_version {
        2 => "application/vnd.fdsn.mseed;version=2".to_string(),
        3 => "application/vnd.fdsn.mseed;version=3".to_string(),
        _ => "application/vnd.fdsn.mseed".to_string(),
    }
}

fn ns_to_rfc3339(ns: i64) -> String {
    let secs = ns.div_euclid(1_000_000_000);
    let nanos = ns.rem_euclid(1_000_000_000) as u32;
    Utc.timestamp_opt(secs, nanos)
        .single()
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Nanos, true))
        .unwrap_or_default()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeIndexPoint {
    pub time_ns: i64,
    pub byte_offset: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeSpanPoint {
    pub start_ns: i64,
    pub end_ns: i64,
    pub sample_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SectionSummary {
    pub source_id: String,
    pub publication_version: u8,
    pub start_ns: i64,
    pub start: String,
    pub end_ns: i64,
    pub end: String,
    pub byte_offset: u64,
    pub byte_count: u64,
    pub md5: String,
    pub content_type: String,
    pub time_ordered_records: bool,
    pub ts_time_byteoffset: Vec<TimeIndexPoint>,
    pub ts_timespans: Vec<TimeSpanPoint>,
}

impl SectionSummary {
    pub fn from_section(section: &Section) -> Self {
        Self {
            source_id: section.source_id.clone(),
            publication_version: section.pub_version,
            start_ns: section.earliest,
            start: ns_to_rfc3339(section.earliest),
            end_ns: section.latest,
            end: ns_to_rfc3339(section.latest),
            byte_offset: section.start_offset,
            byte_count: section.end_offset - section.start_offset + 1,
            md5: section.digest.clone(),
            content_type: content_type_for(section.format_version),
            time_ordered_records: section.time_order,
            ts_time_byteoffset: section
                .time_index
                .iter()
                .map(|e| TimeIndexPoint {
                    time_ns: e.time_ns,
                    byte_offset: e.byte_offset,
                })
                .collect(),
            ts_timespans: section
                .spans
                .iter()
                .map(|s| TimeSpanPoint {
                    start_ns: s.start_ns,
                    end_ns: s.end_ns,
                    sample_rate: s.sample_rate,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileSummary {
    pub path: String,
    /// Set only when every section in the file shares one format version;
    /// otherwise omitted, since `content_type` is inherently a per-section
    /// property (each [`SectionSummary`] always carries its own).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub sha256: String,
    pub digest_covers_whole_file: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_modtime: Option<i64>,
    pub path_indextime: i64,
    pub earliest_ns: i64,
    pub latest_ns: i64,
    pub content: Vec<SectionSummary>,
}

impl FileSummary {
    pub fn new(path: String, extents: &FileExtents, path_modtime: Option<i64>, scan_time: i64, sections: &[Section]) -> Self {
        let content: Vec<SectionSummary> = sections.iter().map(SectionSummary::from_section).collect();
        let content_type = content
            .first()
            .map(|first| &first.content_type)
            .filter(|ct| content.iter().all(|s| &s.content_type == *ct))
            .cloned();
        Self {
            path,
            content_type,
            sha256: extents.sha256.clone(),
            digest_covers_whole_file: extents.digest_covers_whole_file,
            path_modtime,
            path_indextime: scan_time,
            earliest_ns: extents.earliest,
            latest_ns: extents.latest,
            content,
        }
    }
}

/// Write the summary document for a run's files to `path`, where `"-"`
/// means standard output (spec §4.6/§6).
pub fn write_summary(path: &str, files: &[FileSummary]) -> io::Result<()> {
    let json = serde_json::to_string_pretty(files)?;
    if path == "-" {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle.write_all(json.as_bytes())?;
        handle.write_all(b"\n")
    } else {
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_section() -> Section {
        Section::open(
            "XX_STA01__BHZ".to_string(),
            1,
            2,
            0,
            511,
            0,
            1_000_000_000,
            100.0,
            1_000,
            3600_000_000_000,
        )
    }

    #[test]
    fn content_type_mapping() {
        assert_eq!(content_type_for(2), "application/vnd.fdsn.mseed;version=2");
        assert_eq!(content_type_for(3), "application/vnd.fdsn.mseed;version=3");
        assert_eq!(content_type_for(0), "application/vnd.fdsn.mseed");
    }

    #[test]
    fn round_trip_section_summary() {
        let section = sample_section();
        let summary = SectionSummary::from_section(&section);
        let json = serde_json::to_string(&summary).unwrap();
        let parsed: SectionSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(summary, parsed);
    }

    #[test]
    fn round_trip_file_summary() {
        let section = sample_section();
        let extents = FileExtents {
            earliest: 0,
            latest: 1_000_000_000,
            sha256: "deadbeef".to_string(),
            digest_covers_whole_file: true,
        };
        let summary = FileSummary::new("a/b.dat".to_string(), &extents, Some(1_000), 2_000, &[section]);
        let json = serde_json::to_string(&summary).unwrap();
        let parsed: FileSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(summary, parsed);
    }
}
