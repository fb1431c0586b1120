//! ---
//! ksn_section: "02-observability-logging"
//! ksn_subsection: "module"
//! ksn_type: "source"
//! ksn_scope: "code"
//! ksn_description: "Structured status-sink logging adapters."
//! ksn_version: "v0.0.0-prealpha"
//! ksn_owner: "tbd"
//! ---
//! Chainable structured logging for Keelson services.
//!
//! The [`StatusSink`] trait models a log record as a chain of labeled fields
//! ended by a leveled emit call:
//!
//! ```no_run
//! use keelson_logging::{FieldLogger, LogLevel, StatusSink};
//!
//! let sink = FieldLogger::new("billing", LogLevel::Info);
//! sink.event("startup").host("api.internal").info("service online");
//! ```
//!
//! [`FieldLogger`] is the production adapter over the `tracing` stack;
//! [`NoopSink`] discards everything and backs the silent call shapes.
#![warn(missing_docs)]

pub mod level;
pub mod sink;

pub use level::LogLevel;
pub use sink::{FieldLogger, LogFormat, NoopSink, StatusSink};
