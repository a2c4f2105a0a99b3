//! Embedded file backend (spec §6): one SQLite database file, schema and
//! indexes created on first use, case-sensitive `LIKE`, and a configurable
//! busy timeout.

use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection};

use crate::reconcile::serialize::SectionRow;
use crate::store::{Backend, FilenameClause, PreservationCandidate, StoreError, TimeWindow};

pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Connect(e.to_string()))?;
        conn.busy_timeout(busy_timeout)
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        conn.execute_batch("PRAGMA case_sensitive_like = ON;")
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        Ok(Self { conn })
    }

    fn where_clause(clause: &FilenameClause, window: TimeWindow) -> (String, String) {
        let filename_pred = match clause {
            FilenameClause::Prefix(base) => format!("filename LIKE '{base}%'", base = sql_escape(base)),
            FilenameClause::Exact(name) => format!("filename = '{name}'", name = sql_escape(name)),
        };
        let predicate = format!(
            "{filename_pred} AND starttime <= {max_start} AND endtime >= {min_end}",
            max_start = window.max_start,
            min_end = window.min_end,
        );
        (filename_pred, predicate)
    }
}

fn sql_escape(s: &str) -> String {
    s.replace('\'', "''")
}

impl Backend for SqliteBackend {
    fn ensure_schema(&mut self, table: &str) -> Result<(), StoreError> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                network     TEXT NOT NULL,
                station     TEXT NOT NULL,
                location    TEXT NOT NULL,
                channel     TEXT NOT NULL,
                quality     TEXT NOT NULL DEFAULT '',
                version     INTEGER NOT NULL,
                starttime   INTEGER NOT NULL,
                endtime     INTEGER NOT NULL,
                samplerate  REAL NOT NULL,
                filename    TEXT NOT NULL,
                byteoffset  INTEGER NOT NULL,
                bytes       INTEGER NOT NULL,
                hash        TEXT NOT NULL,
                timeindex   TEXT,
                timespans   TEXT NOT NULL,
                timerates   TEXT,
                format      TEXT,
                filemodtime INTEGER NOT NULL,
                updated     INTEGER NOT NULL,
                scanned     INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS {table}_nslc_time_idx
                ON {table} (network, station, location, channel, starttime, endtime);
            CREATE INDEX IF NOT EXISTS {table}_filename_idx ON {table} (filename);
            CREATE INDEX IF NOT EXISTS {table}_updated_idx ON {table} (updated);"
        );
        self.conn
            .execute_batch(&ddl)
            .map_err(|e| StoreError::Prepare(e.to_string()))
    }

    fn preservation_candidates(
        &mut self,
        table: &str,
        clause: &FilenameClause,
        window: TimeWindow,
    ) -> Result<Vec<PreservationCandidate>, StoreError> {
        let (_, predicate) = Self::where_clause(clause, window);
        let sql = format!(
            "SELECT network, station, location, channel, version, hash, updated FROM {table} WHERE {predicate}"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(|e| StoreError::Prepare(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PreservationCandidate {
                    network: row.get(0)?,
                    station: row.get(1)?,
                    location: row.get(2)?,
                    channel: row.get(3)?,
                    pub_version: row.get::<_, i64>(4)? as u8,
                    digest: row.get(5)?,
                    updated: row.get(6)?,
                })
            })
            .map_err(|e| StoreError::Execute(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Execute(e.to_string()))
    }

    fn replace(
        &mut self,
        table: &str,
        clause: &FilenameClause,
        window: TimeWindow,
        rows: &[SectionRow],
        skip_delete: bool,
    ) -> Result<(), StoreError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| StoreError::Execute(e.to_string()))?;

        if !skip_delete {
            let (_, predicate) = Self::where_clause(clause, window);
            let sql = format!("DELETE FROM {table} WHERE {predicate}");
            tx.execute(&sql, []).map_err(|e| StoreError::Execute(e.to_string()))?;
        }

        {
            let insert_sql = format!(
                "INSERT INTO {table} (
                    network, station, location, channel, quality, version,
                    starttime, endtime, samplerate, filename, byteoffset, bytes, hash,
                    timeindex, timespans, timerates, format, filemodtime, updated, scanned
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20)"
            );
            let mut stmt = tx
                .prepare(&insert_sql)
                .map_err(|e| StoreError::Prepare(e.to_string()))?;
            for row in rows {
                let timespans_json =
                    serde_json::to_string(&row.timespans).map_err(|e| StoreError::Execute(e.to_string()))?;
                let timerates_json = row
                    .timerates
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()
                    .map_err(|e| StoreError::Execute(e.to_string()))?;
                stmt.execute(params![
                    row.network,
                    row.station,
                    row.location,
                    row.channel,
                    row.quality,
                    row.pub_version as i64,
                    row.starttime_ns,
                    row.endtime_ns,
                    row.samplerate,
                    row.filename,
                    row.byte_offset as i64,
                    row.bytes as i64,
                    row.hash,
                    row.timeindex,
                    timespans_json,
                    timerates_json,
                    Option::<String>::None,
                    row.filemodtime,
                    row.updated,
                    row.scanned,
                ])
                .map_err(|e| StoreError::Execute(e.to_string()))?;
            }
        }

        tx.commit().map_err(|e| StoreError::Commit(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::serialize::parse_source_id;
    use crate::section::Section;
    use tempfile::tempdir;

    fn sample_row() -> SectionRow {
        let section = Section::open(
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
        );
        let identifier = parse_source_id(&section.source_id).unwrap();
        crate::reconcile::serialize::serialize_section(&section, &identifier, "a/b.dat", 1_500).unwrap()
    }

    #[test]
    fn insert_then_replace_is_idempotent_modulo_scanned() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("index.sqlite");
        let mut backend = SqliteBackend::open(&db_path, Duration::from_millis(1_000)).unwrap();
        backend.ensure_schema("mseed_index").unwrap();

        let clause = FilenameClause::Exact("a/b.dat".to_string());
        let window = TimeWindow {
            max_start: 10_000,
            min_end: -10_000,
        };

        let row = sample_row();
        backend
            .replace("mseed_index", &clause, window, &[row.clone()], true)
            .unwrap();

        let candidates = backend
            .preservation_candidates("mseed_index", &clause, window)
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].digest, row.hash);

        backend
            .replace("mseed_index", &clause, window, &[row], false)
            .unwrap();
        let candidates = backend
            .preservation_candidates("mseed_index", &clause, window)
            .unwrap();
        assert_eq!(candidates.len(), 1);
    }
}
