//! Logger initialisation
//!
//! Log records go to two places: the session's log file, which receives
//! everything at or above the minimum level, and the terminal, which may be
//! set to a quieter level so that an interactive console isn't drowned out by
//! the 20 Hz control loop.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use colored::{ColoredString, Colorize};
use fern;
use log::{self, info};
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Expected a log level of at least `INFO`, found `{0}`")]
    InvalidMinLogLevel(log::LevelFilter),

    #[error("Error initialising the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("An error occured while setting up the logger: {0}")]
    FernInitError(log::SetLoggerError),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
///
/// `file_level` applies to the session log file, `term_level` to stdout.
///
/// # Notes
///
/// - `file_level` must be at least `log::Level::Info` so the file always holds
///   the full record of a flight.
/// - Must only be called once per process, `fern` will refuse a second
///   global logger.
pub fn logger_init(
    file_level: LevelFilter,
    term_level: LevelFilter,
    session: &session::Session,
) -> Result<(), LoggerInitError> {
    if file_level < log::Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(file_level));
    }

    let log_file =
        fern::log_file(&session.log_file_path).map_err(LoggerInitError::LogFileInitError)?;

    // The file never gets colour codes, the terminal does
    let file_dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{:10.6} {}] {}: {}",
                session::get_elapsed_seconds(),
                level_tag(record.level()),
                record.target(),
                message
            ))
        })
        .level(file_level)
        .chain(log_file);

    let term_dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            if record.level() > log::Level::Info {
                out.finish(format_args!(
                    "[{:10.6} {}] {}: {}",
                    session::get_elapsed_seconds(),
                    level_tag_coloured(record.level()),
                    record.target(),
                    message
                ))
            } else {
                out.finish(format_args!(
                    "[{:10.6} {}] {}",
                    session::get_elapsed_seconds(),
                    level_tag_coloured(record.level()),
                    message
                ))
            }
        })
        .level(term_level)
        .chain(std::io::stdout());

    fern::Dispatch::new()
        .level(std::cmp::max(file_level, term_level))
        .level_for("rustyline", LevelFilter::Warn)
        .chain(file_dispatch)
        .chain(term_dispatch)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    if let Some(epoch) = session::get_epoch() {
        info!("    Session epoch: {}", epoch);
    }
    info!("    File log level: {:?}", file_level);
    info!("    Terminal log level: {:?}", term_level);
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn level_tag(level: log::Level) -> &'static str {
    match level {
        log::Level::Trace => "TRC",
        log::Level::Debug => "DBG",
        log::Level::Info => "INF",
        log::Level::Warn => "WRN",
        log::Level::Error => "ERR",
    }
}

fn level_tag_coloured(level: log::Level) -> ColoredString {
    let tag = level_tag(level);
    match level {
        log::Level::Trace => tag.dimmed().italic(),
        log::Level::Debug => tag.dimmed(),
        log::Level::Info => tag.normal(),
        log::Level::Warn => tag.yellow(),
        log::Level::Error => tag.red().bold(),
    }
}
