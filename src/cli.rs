//! Command-line surface (spec §6): one flat, flag-driven invocation rather
//! than subcommands — there is exactly one thing this program does.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::{BackendConfig, Config, DEFAULT_BUSY_TIMEOUT, DEFAULT_RATE_TOLERANCE, DEFAULT_SUB_INDEX_INTERVAL_NS};

/// Index a miniSEED corpus into a queryable Postgres or SQLite summary store.
#[derive(Parser, Debug)]
#[command(name = "mseedindex-rs", version, about)]
pub struct Cli {
    /// Input files. Prefix an argument with `@` to read a list of paths
    /// from that file, one per line. Use `-` to read miniSEED from stdin.
    #[arg(required = true)]
    pub inputs: Vec<String>,

    /// Increase logging verbosity; repeatable (-v, -vv, -vvv).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Skip runs of bytes that do not decode as a valid record instead of
    /// treating them as a fatal error.
    #[arg(long)]
    pub skip_non_data: bool,

    /// Parse and report only; never touch a store.
    #[arg(long)]
    pub no_sync: bool,

    /// Skip the preservation query and delete step; insert unconditionally.
    /// Reserved for initial bulk loads.
    #[arg(long)]
    pub no_update: bool,

    /// Store paths exactly as given instead of canonicalizing them.
    #[arg(long)]
    pub keep_path: bool,

    /// Explicit time tolerance override, in nanoseconds. Defaults to half
    /// the sample period of the record under consideration.
    #[arg(long)]
    pub time_tolerance: Option<i64>,

    /// Relative sample-rate tolerance, e.g. 0.0001 for 0.01%.
    #[arg(long, default_value_t = DEFAULT_RATE_TOLERANCE)]
    pub rate_tolerance: f64,

    /// Sub-index interval, in seconds.
    #[arg(long, default_value_t = DEFAULT_SUB_INDEX_INTERVAL_NS / 1_000_000_000)]
    pub sub_index_interval: i64,

    /// Destination table name.
    #[arg(long, default_value = "mseed_index")]
    pub table: String,

    /// PostgreSQL host. Presence of this flag selects the network backend.
    #[arg(long)]
    pub pg_host: Option<String>,
    #[arg(long, default_value_t = 5432)]
    pub pg_port: u16,
    #[arg(long)]
    pub pg_db: Option<String>,
    #[arg(long)]
    pub pg_user: Option<String>,
    #[arg(long)]
    pub pg_password: Option<String>,
    #[arg(long)]
    pub pg_application_name: Option<String>,

    /// Embedded SQLite database path. Mutually exclusive with `--pg-host`.
    #[arg(long)]
    pub sqlite_path: Option<PathBuf>,

    /// Busy-timeout for the embedded backend, in milliseconds.
    #[arg(long, default_value_t = DEFAULT_BUSY_TIMEOUT.as_millis() as u64)]
    pub busy_timeout_ms: u64,

    /// Write a JSON summary document to this path. Use `-` for stdout.
    #[arg(long)]
    pub json: Option<String>,

    /// Leap-second table path, forwarded unchanged to the record decoder.
    #[arg(long)]
    pub leap_second_file: Option<PathBuf>,
}

impl Cli {
    /// Build the engine [`Config`] this invocation describes. Does not
    /// touch the filesystem or network.
    pub fn to_config(&self) -> Result<Config, String> {
        let backend = match (&self.pg_host, &self.sqlite_path) {
            (Some(_), Some(_)) => {
                return Err("--pg-host and --sqlite-path are mutually exclusive".to_string())
            }
            (Some(host), None) => Some(BackendConfig::Postgres {
                host: host.clone(),
                port: self.pg_port,
                dbname: self
                    .pg_db
                    .clone()
                    .ok_or_else(|| "--pg-db is required with --pg-host".to_string())?,
                user: self
                    .pg_user
                    .clone()
                    .ok_or_else(|| "--pg-user is required with --pg-host".to_string())?,
                password: self.pg_password.clone(),
                application_name: self.pg_application_name.clone(),
            }),
            (None, Some(path)) => Some(BackendConfig::Sqlite {
                path: path.clone(),
                busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            }),
            (None, None) => None,
        };

        Ok(Config {
            skip_non_data: self.skip_non_data,
            no_sync: self.no_sync,
            no_update: self.no_update,
            keep_path: self.keep_path,
            time_tolerance_ns: self.time_tolerance,
            rate_tolerance: self.rate_tolerance,
            sub_index_interval_ns: self.sub_index_interval * 1_000_000_000,
            table: self.table.clone(),
            backend,
            json_path: self.json.clone(),
            leap_second_file: self.leap_second_file.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_conflicting_backends() {
        let cli = Cli {
            inputs: vec!["a.mseed".to_string()],
            verbose: 0,
            skip_non_data: false,
            no_sync: false,
            no_update: false,
            keep_path: false,
            time_tolerance: None,
            rate_tolerance: DEFAULT_RATE_TOLERANCE,
            sub_index_interval: 3600,
            table: "mseed_index".to_string(),
            pg_host: Some("db.example.org".to_string()),
            pg_port: 5432,
            pg_db: Some("seis".to_string()),
            pg_user: Some("indexer".to_string()),
            pg_password: None,
            pg_application_name: None,
            sqlite_path: Some(PathBuf::from("index.sqlite")),
            busy_timeout_ms: 10_000,
            json: None,
            leap_second_file: None,
        };
        assert!(cli.to_config().is_err());
    }
}
