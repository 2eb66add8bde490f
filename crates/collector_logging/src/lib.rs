#![deny(missing_docs)]
//! Shared logging utilities for the collector workspace.
//!
//! This crate provides the `collector_*` logging macros used across the
//! codebase and a minimal test initializer for the global logger.
//!
//! Every macro accepts an optional `task = <id>;` prefix that tags the line
//! with the ingestion job it concerns. The tag travels with the call, so it
//! is correct on whichever thread or runtime worker emits the line.

use std::fmt;

/// Log-line tag naming the ingestion task a message is about.
pub struct TaskTag<'a, T: ?Sized>(pub &'a T);

impl<T: fmt::Display + ?Sized> fmt::Display for TaskTag<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[task={}]", self.0)
    }
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! collector_trace {
    (task = $task:expr; $($arg:tt)*) => {{
        log::trace!("{} {}", $crate::TaskTag(&$task), format_args!($($arg)*));
    }};
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! collector_debug {
    (task = $task:expr; $($arg:tt)*) => {{
        log::debug!("{} {}", $crate::TaskTag(&$task), format_args!($($arg)*));
    }};
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! collector_info {
    (task = $task:expr; $($arg:tt)*) => {{
        log::info!("{} {}", $crate::TaskTag(&$task), format_args!($($arg)*));
    }};
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! collector_warn {
    (task = $task:expr; $($arg:tt)*) => {{
        log::warn!("{} {}", $crate::TaskTag(&$task), format_args!($($arg)*));
    }};
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! collector_error {
    (task = $task:expr; $($arg:tt)*) => {{
        log::error!("{} {}", $crate::TaskTag(&$task), format_args!($($arg)*));
    }};
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Another test may have installed the logger already.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_tag_names_the_job() {
        assert_eq!(TaskTag("abc123").to_string(), "[task=abc123]");
        assert_eq!(format!("{} done", TaskTag(&42)), "[task=42] done");
    }

    #[test]
    fn macros_accept_both_forms() {
        initialize_for_tests();
        let task_id = "abc123";
        collector_info!(task = task_id; "attached after {} ms", 12);
        collector_debug!("plain line {}", 1);
        collector_trace!(task = task_id; "no arguments");
    }
}
