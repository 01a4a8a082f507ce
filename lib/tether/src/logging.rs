//! Logging plumbing shared by every component. Long-lived components accept
//! `Into<Option<&Logger>>` at construction and fall back to a discard logger,
//! so library users that do not care about logs pass `None` and move on.

pub use slog::{debug, error, info, o, trace, warn, Discard, Logger};

use sloggers::terminal::{Destination, TerminalLoggerBuilder};
use sloggers::types::Severity;
use sloggers::Build;

/// Terminal logger used by the binaries.
pub fn term_logger(level: Severity) -> Logger {
    TerminalLoggerBuilder::new()
        .level(level)
        .destination(Destination::Stderr)
        .build()
        .expect("Terminal logger construction failed")
}

/// Maps a CLI log-level name onto a severity, defaulting to `Info`.
pub fn severity_from_str(name: &str) -> Severity {
    match name {
        "trace" => Severity::Trace,
        "debug" => Severity::Debug,
        "warning" | "warn" => Severity::Warning,
        "error" => Severity::Error,
        "critical" => Severity::Critical,
        _ => Severity::Info,
    }
}
