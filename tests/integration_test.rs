use miniseed_index::config::Config;
use miniseed_index::engine::Engine;
use miniseed_index::record::Source;
use miniseed_index::store::sqlite::SqliteBackend;
use rusqlite::Connection;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::{tempdir, NamedTempFile};

/// Row count and distinct `filename`s currently stored, read through a
/// fresh connection so assertions see exactly what the backend committed.
fn table_rows(db_path: &Path, table: &str) -> Vec<String> {
    let conn = Connection::open(db_path).unwrap();
    let mut stmt = conn.prepare(&format!("SELECT filename FROM {table} ORDER BY filename")).unwrap();
    stmt.query_map([], |row| row.get::<_, String>(0))
        .unwrap()
        .map(Result::unwrap)
        .collect()
}

/// Builds one miniSEED v2 record with a blockette 1000 record-length
/// descriptor, matching exactly the fixed layout `record::MseedRecordSource`
/// decodes.
#[allow(clippy::too_many_arguments)]
fn build_v2_record(
    station: &str,
    network: &str,
    year: u16,
    day_of_year: u16,
    hour: u8,
    minute: u8,
    second: u8,
    sample_count: u16,
    rate_factor: i16,
    length_exponent: u8,
) -> Vec<u8> {
    let length = 1usize << length_exponent;
    let mut buf = vec![0u8; length];

    buf[0..6].copy_from_slice(b"000001");
    buf[6] = b'D';
    buf[7] = b' ';
    let mut station_field = [b' '; 5];
    station_field[..station.len()].copy_from_slice(station.as_bytes());
    buf[8..13].copy_from_slice(&station_field);
    buf[13..15].copy_from_slice(b"  ");
    buf[15..18].copy_from_slice(b"BHZ");
    let mut network_field = [b' '; 2];
    network_field[..network.len()].copy_from_slice(network.as_bytes());
    buf[18..20].copy_from_slice(&network_field);

    buf[20..22].copy_from_slice(&year.to_be_bytes());
    buf[22..24].copy_from_slice(&day_of_year.to_be_bytes());
    buf[24] = hour;
    buf[25] = minute;
    buf[26] = second;
    buf[27] = 0;
    buf[28..30].copy_from_slice(&0u16.to_be_bytes());

    buf[30..32].copy_from_slice(&sample_count.to_be_bytes());
    buf[32..34].copy_from_slice(&rate_factor.to_be_bytes());
    buf[34..36].copy_from_slice(&1i16.to_be_bytes());

    buf[39] = 1; // one blockette follows
    buf[46..48].copy_from_slice(&48u16.to_be_bytes()); // first blockette offset

    buf[48..50].copy_from_slice(&1000u16.to_be_bytes()); // blockette type
    buf[50..52].copy_from_slice(&0u16.to_be_bytes()); // next blockette offset
    buf[52] = 10; // data encoding (irrelevant here)
    buf[53] = 0; // word order
    buf[54] = length_exponent;
    buf[55] = 0;

    buf
}

fn engine_config(sqlite_path: &std::path::Path) -> Config {
    Config {
        backend: Some(miniseed_index::config::BackendConfig::Sqlite {
            path: sqlite_path.to_path_buf(),
            busy_timeout: Duration::from_millis(1_000),
        }),
        ..Config::default()
    }
}

#[test]
fn single_contiguous_section_end_to_end() {
    let r1 = build_v2_record("STA01", "XX", 2024, 1, 0, 0, 0, 3000, 100, 9); // 512 bytes
    let r2 = build_v2_record("STA01", "XX", 2024, 1, 0, 0, 30, 3000, 100, 9);
    let r3 = build_v2_record("STA01", "XX", 2024, 1, 0, 1, 0, 3000, 100, 9);

    let mut bytes = Vec::new();
    bytes.extend_from_slice(&r1);
    bytes.extend_from_slice(&r2);
    bytes.extend_from_slice(&r3);

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&bytes).unwrap();

    let dir = tempdir().unwrap();
    let db_path = dir.path().join("index.sqlite");
    let config = engine_config(&db_path);
    let engine = Engine::new(&config);

    let source = Source::Local(file.path().to_path_buf());
    let processed = engine
        .process_file(source, 1_700_000_000, file.path().display().to_string())
        .unwrap();

    assert_eq!(processed.rows.len(), 1);
    let row = &processed.rows[0];
    assert_eq!(row.byte_offset, 0);
    assert_eq!(row.bytes, 1536);
    assert_eq!(row.network, "XX");
    assert_eq!(row.station, "STA01");
}

#[test]
fn rescan_preserves_updated_timestamp() {
    let r1 = build_v2_record("STA02", "XX", 2024, 1, 0, 0, 0, 3000, 100, 9);
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&r1);

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&bytes).unwrap();

    let dir = tempdir().unwrap();
    let db_path = dir.path().join("index.sqlite");
    let config = engine_config(&db_path);
    let engine = Engine::new(&config);
    let filename = file.path().display().to_string();

    let mut backend = SqliteBackend::open(&db_path, Duration::from_millis(1_000)).unwrap();

    let mut first = engine
        .process_file(Source::Local(file.path().to_path_buf()), 1_000, filename.clone())
        .unwrap();
    engine.reconcile(&mut backend, &mut first).unwrap();
    let first_updated = first.rows[0].updated;

    let mut second = engine
        .process_file(Source::Local(file.path().to_path_buf()), 2_000, filename)
        .unwrap();
    engine.reconcile(&mut backend, &mut second).unwrap();

    assert_eq!(second.rows[0].updated, first_updated);
    assert_eq!(second.rows[0].scanned, 2_000);

    // The rescan must have replaced the first row, not appended a duplicate.
    assert_eq!(table_rows(&db_path, "mseed_index").len(), 1);
}

#[test]
fn versioned_filename_replaces_only_matching_prefix() {
    let r1 = build_v2_record("STA03", "XX", 2024, 1, 0, 0, 0, 3000, 100, 9);
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&r1).unwrap();

    let dir = tempdir().unwrap();
    let db_path = dir.path().join("index.sqlite");
    let config = engine_config(&db_path);
    let engine = Engine::new(&config);
    let mut backend = SqliteBackend::open(&db_path, Duration::from_millis(1_000)).unwrap();

    let mut v1 = engine
        .process_file(Source::Local(file.path().to_path_buf()), 1_000, "/a/b.dat#1".to_string())
        .unwrap();
    engine.reconcile(&mut backend, &mut v1).unwrap();

    let mut v2 = engine
        .process_file(Source::Local(file.path().to_path_buf()), 2_000, "/a/b.dat#2".to_string())
        .unwrap();
    engine.reconcile(&mut backend, &mut v2).unwrap();

    assert_eq!(v2.rows[0].filename, "/a/b.dat#2");

    // The `#1` row must be gone, replaced by `#2`, not left alongside it.
    assert_eq!(table_rows(&db_path, "mseed_index"), vec!["/a/b.dat#2".to_string()]);
}
