//! Logging configuration for the `burnr` CLI.
//!
//! Diagnostics from `burnr-core` go through the `log` facade. They are shown
//! on the terminal at a level picked by `-v`, and can additionally be
//! appended to a file for later auditing with `--log-file`.

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::OpenOptions;
use std::path::Path;

/// Maps the number of `-v` flags to a terminal log level.
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

fn config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_thread_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .build()
}

/// Initializes terminal logging, plus a debug-level file log if `log_file` is given.
///
/// Failure to open the log file is reported and logging falls back to the
/// terminal only; it never stops a run.
pub fn init(verbosity: u8, log_file: Option<&Path>) {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level_for(verbosity),
        config(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];

    if let Some(path) = log_file {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => loggers.push(WriteLogger::new(LevelFilter::Debug, config(), file)),
            Err(e) => eprintln!("Warning: Could not open log file {}: {}", path.display(), e),
        }
    }

    if CombinedLogger::init(loggers).is_err() {
        eprintln!("Warning: Logger already initialized");
    }

    log::debug!("=== burnr {} session started ===", env!("CARGO_PKG_VERSION"));
}
