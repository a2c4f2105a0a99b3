use std::process::ExitCode;

use clap::Parser;

use miniseed_index::cli::Cli;
use miniseed_index::config::{BackendConfig, Config};
use miniseed_index::engine::Engine;
use miniseed_index::error::IndexError;
use miniseed_index::json_output::{self, FileSummary};
use miniseed_index::record::Source;
use miniseed_index::store::postgres::{ConnectParams, PostgresBackend};
use miniseed_index::store::sqlite::SqliteBackend;
use miniseed_index::store::Backend;
use miniseed_index::{listfile, logging, pathcanon};

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ERROR: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), IndexError> {
    let config = cli.to_config().map_err(IndexError::Argument)?;

    let paths = listfile::expand_all(&cli.inputs)?;
    if paths.is_empty() {
        return Err(IndexError::Argument("no input files given".to_string()));
    }

    let mut backend = open_backend(&config)?;
    let engine = Engine::new(&config);
    let scan_time = current_scan_time();

    let mut summaries: Vec<FileSummary> = Vec::new();

    for raw_path in &paths {
        let canon = pathcanon::canonicalize(raw_path, config.keep_path);
        let source = if raw_path == "-" {
            Source::Stdin
        } else {
            Source::Local(canon.clone().into())
        };

        let mut processed = engine.process_file(source, scan_time, canon)?;
        log::info!(
            "{}: {} section(s)",
            processed.filename,
            processed.summary.content.len()
        );

        if let Some(backend) = backend.as_deref_mut() {
            engine.reconcile(backend, &mut processed)?;
        }

        summaries.push(processed.summary);
    }

    if let Some(json_path) = &config.json_path {
        json_output::write_summary(json_path, &summaries)?;
    }

    Ok(())
}

fn open_backend(config: &Config) -> Result<Option<Box<dyn Backend>>, IndexError> {
    if config.no_sync {
        return Ok(None);
    }
    match &config.backend {
        Some(BackendConfig::Sqlite { path, busy_timeout }) => {
            let backend = SqliteBackend::open(path, *busy_timeout).map_err(|source| IndexError::Store {
                path: path.to_string_lossy().into_owned(),
                source,
            })?;
            Ok(Some(Box::new(backend)))
        }
        Some(BackendConfig::Postgres {
            host,
            port,
            dbname,
            user,
            password,
            application_name,
        }) => {
            let params = ConnectParams {
                host: host.clone(),
                port: *port,
                dbname: dbname.clone(),
                user: user.clone(),
                password: password.clone(),
                application_name: application_name.clone(),
            };
            let backend = PostgresBackend::connect(&params).map_err(|source| IndexError::Store {
                path: host.clone(),
                source,
            })?;
            Ok(Some(Box::new(backend)))
        }
        None => Ok(None),
    }
}

fn current_scan_time() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
