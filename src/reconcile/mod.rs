//! Index Reconciler — matching, preservation, and atomic replacement
//! (spec §4.4), built on top of [`serialize`] and [`crate::store`].

pub mod serialize;

use std::collections::HashMap;

use crate::store::{Backend, FilenameClause, StoreError, TimeWindow};
use serialize::SectionRow;

const PRESERVATION_WINDOW_NS: i64 = 86_400 * 1_000_000_000;

/// Narrow the store query to rows whose extents could plausibly overlap
/// this file's, per spec §4.4: `starttime <= latest + 1 day`, `endtime >=
/// earliest - 1 day`. `starttime`/`endtime` are stored in nanoseconds
/// (matching `Section::earliest`/`latest`), so the window stays in
/// nanoseconds too.
pub fn time_window(file_earliest_ns: i64, file_latest_ns: i64) -> TimeWindow {
    TimeWindow {
        max_start: file_latest_ns + PRESERVATION_WINDOW_NS,
        min_end: file_earliest_ns - PRESERVATION_WINDOW_NS,
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct PreservationKey {
    network: String,
    station: String,
    location: String,
    channel: String,
    pub_version: u8,
    digest: String,
}

/// Overwrite each row's `updated` with a matching prior row's `updated`
/// when `(network, station, location, channel, pub_version, digest)`
/// agree (spec §4.4 preservation rule). When more than one candidate
/// shares a key — possible for duplicate content at different offsets —
/// the last candidate in query order wins, matching the ambiguity the
/// design notes call out explicitly.
pub fn apply_preservation(rows: &mut [SectionRow], candidates: &[crate::store::PreservationCandidate]) {
    let mut by_key: HashMap<PreservationKey, i64> = HashMap::new();
    for candidate in candidates {
        let key = PreservationKey {
            network: candidate.network.clone(),
            station: candidate.station.clone(),
            location: candidate.location.clone(),
            channel: candidate.channel.clone(),
            pub_version: candidate.pub_version,
            digest: candidate.digest.clone(),
        };
        by_key.insert(key, candidate.updated);
    }

    for row in rows.iter_mut() {
        let key = PreservationKey {
            network: row.network.clone(),
            station: row.station.clone(),
            location: row.location.clone(),
            channel: row.channel.clone(),
            pub_version: row.pub_version,
            digest: row.hash.clone(),
        };
        if let Some(updated) = by_key.get(&key) {
            row.updated = *updated;
        }
    }
}

/// Run the full Reconciler for one file against one backend: optionally
/// query preservation candidates and apply the preservation rule, then
/// replace the file's rows in a single transaction (spec §4.4).
///
/// `no_update` skips both the preservation query and the delete step;
/// inserts proceed unconditionally (reserved for initial bulk loads).
pub fn reconcile_file(
    backend: &mut dyn Backend,
    table: &str,
    filename: &str,
    rows: &mut Vec<SectionRow>,
    file_earliest_ns: i64,
    file_latest_ns: i64,
    no_update: bool,
) -> Result<(), StoreError> {
    let clause = crate::store::filename_clause(filename);
    let window = time_window(file_earliest_ns, file_latest_ns);

    if !no_update {
        let candidates = backend.preservation_candidates(table, &clause, window)?;
        apply_preservation(rows, &candidates);
    }

    backend.replace(table, &clause, window, rows, no_update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PreservationCandidate;

    fn row(network: &str, station: &str, digest: &str, updated: i64) -> SectionRow {
        SectionRow {
            network: network.to_string(),
            station: station.to_string(),
            location: String::new(),
            channel: "BHZ".to_string(),
            quality: String::new(),
            pub_version: 1,
            starttime_ns: 0,
            endtime_ns: 1_000_000_000,
            samplerate: 100.0,
            filename: "a/b.dat".to_string(),
            byte_offset: 0,
            bytes: 512,
            hash: digest.to_string(),
            timeindex: None,
            timespans: vec![],
            timerates: None,
            filemodtime: 500,
            updated,
            scanned: 999,
        }
    }

    #[test]
    fn matching_digest_preserves_updated() {
        let mut rows = vec![row("XX", "STA01", "deadbeef", 500)];
        let candidates = vec![PreservationCandidate {
            network: "XX".to_string(),
            station: "STA01".to_string(),
            location: String::new(),
            channel: "BHZ".to_string(),
            pub_version: 1,
            digest: "deadbeef".to_string(),
            updated: 111,
        }];
        apply_preservation(&mut rows, &candidates);
        assert_eq!(rows[0].updated, 111);
    }

    #[test]
    fn differing_digest_keeps_file_mod_time() {
        let mut rows = vec![row("XX", "STA01", "newhash", 500)];
        let candidates = vec![PreservationCandidate {
            network: "XX".to_string(),
            station: "STA01".to_string(),
            location: String::new(),
            channel: "BHZ".to_string(),
            pub_version: 1,
            digest: "deadbeef".to_string(),
            updated: 111,
        }];
        apply_preservation(&mut rows, &candidates);
        assert_eq!(rows[0].updated, 500);
    }

    #[test]
    fn duplicate_key_last_candidate_wins() {
        let mut rows = vec![row("XX", "STA01", "deadbeef", 500)];
        let candidates = vec![
            PreservationCandidate {
                network: "XX".to_string(),
                station: "STA01".to_string(),
                location: String::new(),
                channel: "BHZ".to_string(),
                pub_version: 1,
                digest: "deadbeef".to_string(),
                updated: 111,
            },
            PreservationCandidate {
                network: "XX".to_string(),
                station: "STA01".to_string(),
                location: String::new(),
                channel: "BHZ".to_string(),
                pub_version: 1,
                digest: "deadbeef".to_string(),
                updated: 222,
            },
        ];
        apply_preservation(&mut rows, &candidates);
        assert_eq!(rows[0].updated, 222);
    }
}
