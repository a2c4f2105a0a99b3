//! Thin `env_logger` initialization driven by repeated `-v` flags.

/// Map a verbosity count (number of `-v` occurrences) to a `log::LevelFilter`.
pub fn level_for_verbosity(verbosity: u8) -> log::LevelFilter {
    match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

/// Initialize the global logger. Safe to call once at process start.
pub fn init(verbosity: u8) {
    env_logger::Builder::new()
        .filter_level(level_for_verbosity(verbosity))
        .format_timestamp_millis()
        .init();
}
