//! Network SQL backend (spec §6): a pre-existing PostgreSQL table, UTC
//! session time zone, driven by the same serialization rules as
//! [`super::sqlite`].
//!
//! Connections are synchronous (`postgres::Client`, not `tokio-postgres`):
//! spec §5 requires a single-threaded, non-async engine, so pulling in an
//! async runtime for one dependency would be pure overhead.

use postgres::{Client, NoTls};

use crate::reconcile::serialize::SectionRow;
use crate::store::{Backend, FilenameClause, PreservationCandidate, StoreError, TimeWindow};

pub struct PostgresBackend {
    client: Client,
}

pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: Option<String>,
    pub application_name: Option<String>,
}

impl PostgresBackend {
    pub fn connect(params: &ConnectParams) -> Result<Self, StoreError> {
        let mut conn_str = format!(
            "host={} port={} dbname={} user={}",
            params.host, params.port, params.dbname, params.user
        );
        if let Some(password) = &params.password {
            conn_str.push_str(&format!(" password={password}"));
        }
        conn_str.push_str(&format!(
            " application_name={}",
            params.application_name.as_deref().unwrap_or("mseedindex-rs")
        ));

        let mut client = Client::connect(&conn_str, NoTls).map_err(|e| StoreError::Connect(e.to_string()))?;
        client
            .simple_query("SET TIME ZONE 'UTC'")
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        Ok(Self { client })
    }

    fn where_clause(clause: &FilenameClause) -> (&'static str, String) {
        match clause {
            FilenameClause::Prefix(base) => ("filename LIKE $1 || '%'", base.clone()),
            FilenameClause::Exact(name) => ("filename = $1", name.clone()),
        }
    }
}

impl Backend for PostgresBackend {
    fn ensure_schema(&mut self, _table: &str) -> Result<(), StoreError> {
        // The network backend's table is expected to pre-exist (spec §6);
        // nothing to create here.
        Ok(())
    }

    fn preservation_candidates(
        &mut self,
        table: &str,
        clause: &FilenameClause,
        window: TimeWindow,
    ) -> Result<Vec<PreservationCandidate>, StoreError> {
        let (filename_pred, filename_param) = Self::where_clause(clause);
        let sql = format!(
            "SELECT network, station, location, channel, version, hash, updated \
             FROM {table} WHERE {filename_pred} AND starttime <= $2 AND endtime >= $3"
        );
        let rows = self
            .client
            .query(&sql, &[&filename_param, &window.max_start, &window.min_end])
            .map_err(|e| StoreError::Execute(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|row| PreservationCandidate {
                network: row.get(0),
                station: row.get(1),
                location: row.get(2),
                channel: row.get(3),
                pub_version: row.get::<_, i32>(4) as u8,
                digest: row.get(5),
                updated: row.get(6),
            })
            .collect())
    }

    fn replace(
        &mut self,
        table: &str,
        clause: &FilenameClause,
        window: TimeWindow,
        rows: &[SectionRow],
        skip_delete: bool,
    ) -> Result<(), StoreError> {
        let mut tx = self
            .client
            .transaction()
            .map_err(|e| StoreError::Execute(e.to_string()))?;

        if !skip_delete {
            let (filename_pred, filename_param) = Self::where_clause(clause);
            let sql = format!("DELETE FROM {table} WHERE {filename_pred} AND starttime <= $2 AND endtime >= $3");
            tx.execute(&sql, &[&filename_param, &window.max_start, &window.min_end])
                .map_err(|e| StoreError::Execute(e.to_string()))?;
        }

        let insert_sql = format!(
            "INSERT INTO {table} (
                network, station, location, channel, quality, version,
                starttime, endtime, samplerate, filename, byteoffset, bytes, hash,
                timeindex, timespans, timerates, format, filemodtime, updated, scanned
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14::hstore,$15::text[]::int8range[],$16,$17,$18,$19,$20)"
        );
        let stmt = tx
            .prepare(&insert_sql)
            .map_err(|e| StoreError::Prepare(e.to_string()))?;

        for row in rows {
            // One inclusive `int8range` literal per span, per spec §6's
            // "array of numeric ranges" — not a flattened [s,e,s,e,...].
            let timespans_ranges: Vec<String> = row
                .timespans
                .iter()
                .map(|(s, e)| format!("[{s},{e}]"))
                .collect();
            tx.execute(
                &stmt,
                &[
                    &row.network,
                    &row.station,
                    &row.location,
                    &row.channel,
                    &row.quality,
                    &(row.pub_version as i32),
                    &row.starttime_ns,
                    &row.endtime_ns,
                    &row.samplerate,
                    &row.filename,
                    &(row.byte_offset as i64),
                    &(row.bytes as i64),
                    &row.hash,
                    &row.timeindex,
                    &timespans_ranges,
                    &row.timerates,
                    &Option::<String>::None,
                    &row.filemodtime,
                    &row.updated,
                    &row.scanned,
                ],
            )
            .map_err(|e| StoreError::Execute(e.to_string()))?;
        }

        tx.commit().map_err(|e| StoreError::Commit(e.to_string()))
    }
}
