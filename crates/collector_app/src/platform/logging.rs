//! Logger initialization for the `collector` binary.
//!
//! Log lines go to a file by default so they do not interleave with the
//! progress and record output printed on stdout.

use std::fs::File;
use std::path::PathBuf;

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

/// Destination for log output.
pub enum LogDestination {
    /// Append to the given file.
    File(PathBuf),
    /// Write to the terminal (stderr).
    Terminal,
    /// Write to both the file and the terminal.
    Both(PathBuf),
}

/// Initialize the logger with the specified destination and level.
///
/// A log file that cannot be opened is reported on stderr and skipped.
pub fn initialize(destination: LogDestination, level: LevelFilter) {
    let config = build_config();

    let loggers: Vec<Box<dyn SharedLogger>> = match destination {
        LogDestination::File(path) => match create_file_logger(path, level, config) {
            Some(file_logger) => vec![file_logger],
            None => return,
        },
        LogDestination::Terminal => vec![terminal_logger(level, config)],
        LogDestination::Both(path) => {
            let mut loggers = vec![terminal_logger(level, config.clone())];
            if let Some(file_logger) = create_file_logger(path, level, config) {
                loggers.push(file_logger);
            }
            loggers
        }
    };

    let _ = CombinedLogger::init(loggers);
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

fn terminal_logger(level: LevelFilter, config: Config) -> Box<dyn SharedLogger> {
    // Stdout carries the command's own output.
    TermLogger::new(level, config, TerminalMode::Stderr, ColorChoice::Auto)
}

fn create_file_logger(
    path: PathBuf,
    level: LevelFilter,
    config: Config,
) -> Option<Box<dyn SharedLogger>> {
    let file = File::options().create(true).append(true).open(&path);
    match file {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("Warning: could not open log file {}: {}", path.display(), err);
            None
        }
    }
}
