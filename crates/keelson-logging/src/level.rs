//! ---
//! ksn_section: "02-observability-logging"
//! ksn_subsection: "module"
//! ksn_type: "source"
//! ksn_scope: "code"
//! ksn_description: "Log level taxonomy and parsing."
//! ksn_version: "v0.0.0-prealpha"
//! ksn_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

/// Severity threshold for a sink. Levels at or above the threshold are emitted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogLevel {
    /// Verbose diagnostics.
    Debug,
    /// Routine operational events.
    #[default]
    Info,
    /// Recoverable anomalies.
    Warning,
    /// Failures that leave the service running.
    Error,
    /// Failures followed by process exit.
    Fatal,
    /// Failures followed by a propagating panic.
    Panic,
    /// Suppress all output.
    Disabled,
}

impl LogLevel {
    /// Parse a level name case-insensitively. Unknown input falls back to `Info`.
    pub fn parse(level: &str) -> Self {
        match level.to_ascii_uppercase().as_str() {
            "DEBUG" => LogLevel::Debug,
            "INFO" => LogLevel::Info,
            "WARNING" => LogLevel::Warning,
            "ERROR" => LogLevel::Error,
            "FATAL" => LogLevel::Fatal,
            "PANIC" => LogLevel::Panic,
            "DISABLED" => LogLevel::Disabled,
            _ => LogLevel::Info,
        }
    }

    /// Filter directive handed to the subscriber when the environment does not
    /// override it. `Fatal` and `Panic` records are emitted at error level,
    /// so they share the `error` directive.
    pub(crate) fn directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Fatal | LogLevel::Panic => "error",
            LogLevel::Disabled => "off",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_known_levels_case_insensitively() {
        assert_eq!(LogLevel::parse("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::parse("INFO"), LogLevel::Info);
        assert_eq!(LogLevel::parse("Warning"), LogLevel::Warning);
        assert_eq!(LogLevel::parse("error"), LogLevel::Error);
        assert_eq!(LogLevel::parse("FATAL"), LogLevel::Fatal);
        assert_eq!(LogLevel::parse("panic"), LogLevel::Panic);
        assert_eq!(LogLevel::parse("disabled"), LogLevel::Disabled);
    }

    #[test]
    fn parse_defaults_to_info() {
        assert_eq!(LogLevel::parse(""), LogLevel::Info);
        assert_eq!(LogLevel::parse("verbose"), LogLevel::Info);
    }
}
