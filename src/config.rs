//! Runtime configuration, threaded explicitly through the call graph.
//!
//! Per the source's design notes: verbosity, tolerances, and backend
//! selection are configuration, not process-wide mutable globals. Every
//! constructor that needs one of these values takes a `&Config` (or a
//! narrower reference derived from it) rather than reading a static.

use std::path::PathBuf;
use std::time::Duration;

/// Selects which backing store a run reconciles against.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    Sqlite {
        path: PathBuf,
        busy_timeout: Duration,
    },
    Postgres {
        host: String,
        port: u16,
        dbname: String,
        user: String,
        password: Option<String>,
        application_name: Option<String>,
    },
}

/// All CLI-configurable behavior, gathered into one explicit value.
#[derive(Debug, Clone)]
pub struct Config {
    /// Skip runs of bytes the decoder does not recognize as a valid record
    /// instead of treating them as a fatal decode error.
    pub skip_non_data: bool,
    /// Skip the Reconciler entirely (parse and report only).
    pub no_sync: bool,
    /// Skip the preservation query and the delete step; insert unconditionally.
    pub no_update: bool,
    /// Store paths as given rather than canonicalizing them.
    pub keep_path: bool,
    /// Explicit time tolerance override (nanoseconds). `None` = derive from
    /// each record's sample period (see `tolerance::DefaultTolerances`).
    pub time_tolerance_ns: Option<i64>,
    /// Relative sample-rate tolerance, e.g. `1e-4`.
    pub rate_tolerance: f64,
    /// Sub-index interval, in nanoseconds (default 3600 s).
    pub sub_index_interval_ns: i64,
    /// Destination table name for the configured backend.
    pub table: String,
    /// Backend to reconcile against; `None` means parse-only (combined with
    /// `--json` this is still useful for producing a summary with no store).
    pub backend: Option<BackendConfig>,
    /// Optional JSON summary sink path (`"-"` means stdout).
    pub json_path: Option<String>,
    /// Leap-second table path forwarded unchanged to the record decoder.
    pub leap_second_file: Option<PathBuf>,
}

pub const DEFAULT_RATE_TOLERANCE: f64 = 1e-4;
pub const DEFAULT_SUB_INDEX_INTERVAL_NS: i64 = 3600 * 1_000_000_000;
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(10_000);

impl Default for Config {
    fn default() -> Self {
        Self {
            skip_non_data: false,
            no_sync: false,
            no_update: false,
            keep_path: false,
            time_tolerance_ns: None,
            rate_tolerance: DEFAULT_RATE_TOLERANCE,
            sub_index_interval_ns: DEFAULT_SUB_INDEX_INTERVAL_NS,
            table: "mseed_index".to_string(),
            backend: None,
            json_path: None,
            leap_second_file: None,
        }
    }
}
