//! Index Reconciler — serialization rules (spec §4.5): turns a closed
//! [`Section`] into the column values a backend will write, independent of
//! which backend it is.

use thiserror::Error;

use crate::aggregator::AggregateError;
use crate::section::Section;

/// 8 MiB soft cap on any single serialized column, per the resource
/// exhaustion error class.
pub const SOFT_CAP_BYTES: usize = 8 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum SerializeError {
    #[error("serialized {field} for section {source_id} is {size} bytes, exceeding the {cap}-byte cap")]
    TooLarge {
        field: &'static str,
        source_id: String,
        size: usize,
        cap: usize,
    },
}

/// A source identifier decomposed into its four SEED codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
}

/// Decompose a `NET_STA_LOC_CHAN`-shaped source identifier. Fatal for the
/// file if it doesn't have exactly four underscore-separated fields.
pub fn parse_source_id(source_id: &str) -> Result<Identifier, AggregateError> {
    let parts: Vec<&str> = source_id.split('_').collect();
    if parts.len() != 4 {
        return Err(AggregateError::SourceIdParse {
            source_id: source_id.to_string(),
            reason: format!("expected 4 underscore-separated fields, found {}", parts.len()),
        });
    }
    Ok(Identifier {
        network: parts[0].to_string(),
        station: parts[1].to_string(),
        location: parts[2].to_string(),
        channel: parts[3].to_string(),
    })
}

/// A fully materialized row, ready for a backend to write. Column types are
/// the "semantic" types of spec §4.5; each backend maps them to its own
/// wire representation.
#[derive(Debug, Clone)]
pub struct SectionRow {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    /// Always empty: no record field currently feeds this legacy column.
    pub quality: String,
    pub pub_version: u8,
    pub starttime_ns: i64,
    pub endtime_ns: i64,
    pub samplerate: f64,
    pub filename: String,
    pub byte_offset: u64,
    pub bytes: u64,
    pub hash: String,
    /// `key=>value` associative text, or `None` when the index guard fails.
    pub timeindex: Option<String>,
    /// Epoch-second `[start, end]` inclusive intervals, one per span.
    pub timespans: Vec<(i64, i64)>,
    /// Per-span sample rates; only populated when the section's rate
    /// disagreed with its nominal rate somewhere along the way.
    pub timerates: Option<Vec<f64>>,
    pub filemodtime: i64,
    pub updated: i64,
    pub scanned: i64,
}

fn ns_to_epoch_s(ns: i64) -> i64 {
    ns.div_euclid(1_000_000_000)
}

/// Build the associative `timeindex` text for a section, honoring the
/// guard of spec §4.5: present only when the first entry's time equals
/// `section.earliest`.
fn serialize_timeindex(section: &Section) -> Option<String> {
    let first = section.time_index.first()?;
    if first.time_ns != section.earliest {
        return None;
    }
    let mut pairs: Vec<String> = section
        .time_index
        .iter()
        .map(|e| format!("{}=>{}", e.time_ns, e.byte_offset))
        .collect();
    pairs.push(format!("latest=>{}", if section.time_order { 1 } else { 0 }));
    Some(pairs.join(", "))
}

/// Turn one closed section into a [`SectionRow`], per the column rules of
/// spec §4.5. `identifier` must already have been parsed from
/// `section.source_id` by the caller (an identifier parse failure is an
/// integrity error, handled before serialization is attempted). `scanned`
/// is the file's scan time (seconds since epoch).
pub fn serialize_section(
    section: &Section,
    identifier: &Identifier,
    filename: &str,
    scanned: i64,
) -> Result<SectionRow, SerializeError> {
    let timeindex = serialize_timeindex(section);
    if let Some(ref encoded) = timeindex {
        if encoded.len() > SOFT_CAP_BYTES {
            return Err(SerializeError::TooLarge {
                field: "timeindex",
                source_id: section.source_id.clone(),
                size: encoded.len(),
                cap: SOFT_CAP_BYTES,
            });
        }
    }

    let timespans: Vec<(i64, i64)> = section
        .spans
        .iter()
        .map(|s| (ns_to_epoch_s(s.start_ns), ns_to_epoch_s(s.end_ns)))
        .collect();
    if timespans.len() * 16 > SOFT_CAP_BYTES {
        return Err(SerializeError::TooLarge {
            field: "timespans",
            source_id: section.source_id.clone(),
            size: timespans.len() * 16,
            cap: SOFT_CAP_BYTES,
        });
    }

    let timerates = if section.rate_mismatch {
        Some(section.spans.iter().map(|s| s.sample_rate).collect())
    } else {
        None
    };

    Ok(SectionRow {
        network: identifier.network.clone(),
        station: identifier.station.clone(),
        location: identifier.location.clone(),
        channel: identifier.channel.clone(),
        quality: String::new(),
        pub_version: section.pub_version,
        starttime_ns: section.earliest,
        endtime_ns: section.latest,
        samplerate: section.nom_samprate,
        filename: filename.to_string(),
        byte_offset: section.start_offset,
        bytes: section.end_offset - section.start_offset + 1,
        hash: section.digest.clone(),
        timeindex,
        timespans,
        timerates,
        filemodtime: section.updated_at,
        updated: section.updated_at,
        scanned,
    })
}
