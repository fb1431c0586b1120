//! ---
//! ksn_section: "02-observability-logging"
//! ksn_subsection: "module"
//! ksn_type: "source"
//! ksn_scope: "code"
//! ksn_description: "Status sink trait and tracing-backed adapters."
//! ksn_version: "v0.0.0-prealpha"
//! ksn_owner: "tbd"
//! ---
use std::fmt;
use std::path::Path;
use std::process;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt as subscriber_fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::level::LogLevel;

const LOG_ENV: &str = "KEELSON_LOG";

static FILE_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();
static STDOUT_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

/// Output formats for the production sink.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    /// Machine-parseable JSON records on stdout.
    #[default]
    StructuredJson,
    /// Human-readable console output.
    Pretty,
}

/// Chainable structured-logging collaborator.
///
/// Field setters attach one labeled field each and return a new sink value;
/// a chain link never mutates the sink it was derived from, so chains built
/// from a shared sink are independent. Terminal calls flush the accumulated
/// field set as a single structured record and are the only observable side
/// effect.
pub trait StatusSink: Sized {
    /// Attach an event name.
    fn event(&self, name: &str) -> Self;
    /// Attach the identity of a received OS signal.
    fn signal(&self, signal: impl fmt::Display) -> Self;
    /// Attach an operation duration.
    fn duration(&self, duration: Duration) -> Self;
    /// Attach an HTTP status code.
    fn status_code(&self, code: u16) -> Self;
    /// Attach the peer address of a request.
    fn remote_addr(&self, addr: &str) -> Self;
    /// Attach a request correlation id.
    fn request_id(&self, id: &str) -> Self;
    /// Attach an HTTP method.
    fn method(&self, method: &str) -> Self;
    /// Attach a request URI.
    fn uri(&self, uri: &str) -> Self;
    /// Attach a client user agent.
    fn user_agent(&self, user_agent: &str) -> Self;
    /// Attach a response payload size.
    fn bytes_written(&self, bytes: u64) -> Self;
    /// Attach the serving host.
    fn host(&self, host: &str) -> Self;

    /// Emit the accumulated record at info level.
    fn info(&self, msg: &str);
    /// Emit the accumulated record at warning level.
    fn warn(&self, msg: &str);
    /// Emit the accumulated record at debug level.
    fn debug(&self, msg: &str);
    /// Emit the accumulated record and the error at error level.
    fn error(&self, msg: &str, error: impl fmt::Display);
    /// Emit the accumulated record and the error, then exit the process.
    fn fatal(&self, msg: &str, error: impl fmt::Display);
    /// Emit the accumulated record, then panic with the message.
    fn panic(&self, msg: &str);
}

#[derive(Debug, Clone, Default)]
struct FieldSet {
    bytes_written: Option<u64>,
    duration: Option<Duration>,
    event: Option<String>,
    host: Option<String>,
    method: Option<String>,
    remote_addr: Option<String>,
    request_id: Option<String>,
    signal: Option<String>,
    status_code: Option<u16>,
    uri: Option<String>,
    user_agent: Option<String>,
}

/// Production [`StatusSink`] backed by the `tracing` subscriber stack.
///
/// Every record carries the service name given at construction. Constructors
/// install the global subscriber once; later constructions reuse whichever
/// subscriber won the race, matching how the rest of the workspace
/// initialises tracing.
#[derive(Debug, Clone)]
pub struct FieldLogger {
    service: String,
    fields: FieldSet,
}

impl FieldLogger {
    /// Sink emitting structured JSON to stdout.
    pub fn new(service: &str, level: LogLevel) -> Self {
        install_subscriber(level, LogFormat::StructuredJson, None);
        Self {
            service: service.to_owned(),
            fields: FieldSet::default(),
        }
    }

    /// Sink emitting human-readable console output.
    pub fn console(service: &str, level: LogLevel) -> Self {
        install_subscriber(level, LogFormat::Pretty, None);
        Self {
            service: service.to_owned(),
            fields: FieldSet::default(),
        }
    }

    /// Sink that additionally appends JSON records to a daily rolling file
    /// under `directory`.
    pub fn with_rolling_file(
        service: &str,
        level: LogLevel,
        directory: &Path,
    ) -> std::io::Result<Self> {
        std::fs::create_dir_all(directory)?;
        install_subscriber(level, LogFormat::StructuredJson, Some((directory, service)));
        Ok(Self {
            service: service.to_owned(),
            fields: FieldSet::default(),
        })
    }

    fn derive(&self, set: impl FnOnce(&mut FieldSet)) -> Self {
        let mut link = self.clone();
        set(&mut link.fields);
        link
    }

    fn emit(&self, level: Level, msg: &str, error: Option<String>) {
        let f = &self.fields;
        macro_rules! emit_at {
            ($lvl:expr) => {
                tracing::event!(
                    $lvl,
                    service = %self.service,
                    event = f.event.as_deref().unwrap_or(""),
                    signal = f.signal.as_deref().unwrap_or(""),
                    duration = f.duration.map_or(0, |d| d.as_millis() as u64),
                    status_code = f.status_code.unwrap_or(0),
                    remote_addr_key = f.remote_addr.as_deref().unwrap_or(""),
                    request_id = f.request_id.as_deref().unwrap_or(""),
                    method_key = f.method.as_deref().unwrap_or(""),
                    uri_key = f.uri.as_deref().unwrap_or(""),
                    user_agent_key = f.user_agent.as_deref().unwrap_or(""),
                    bytes_written = f.bytes_written.unwrap_or(0),
                    host = f.host.as_deref().unwrap_or(""),
                    error = error.as_deref().unwrap_or(""),
                    "{}",
                    msg
                )
            };
        }
        match level {
            Level::TRACE => emit_at!(Level::TRACE),
            Level::DEBUG => emit_at!(Level::DEBUG),
            Level::INFO => emit_at!(Level::INFO),
            Level::WARN => emit_at!(Level::WARN),
            Level::ERROR => emit_at!(Level::ERROR),
        }
    }
}

impl StatusSink for FieldLogger {
    fn event(&self, name: &str) -> Self {
        self.derive(|f| f.event = Some(name.to_owned()))
    }

    fn signal(&self, signal: impl fmt::Display) -> Self {
        self.derive(|f| f.signal = Some(signal.to_string()))
    }

    fn duration(&self, duration: Duration) -> Self {
        self.derive(|f| f.duration = Some(duration))
    }

    fn status_code(&self, code: u16) -> Self {
        self.derive(|f| f.status_code = Some(code))
    }

    fn remote_addr(&self, addr: &str) -> Self {
        self.derive(|f| f.remote_addr = Some(addr.to_owned()))
    }

    fn request_id(&self, id: &str) -> Self {
        self.derive(|f| f.request_id = Some(id.to_owned()))
    }

    fn method(&self, method: &str) -> Self {
        self.derive(|f| f.method = Some(method.to_owned()))
    }

    fn uri(&self, uri: &str) -> Self {
        self.derive(|f| f.uri = Some(uri.to_owned()))
    }

    fn user_agent(&self, user_agent: &str) -> Self {
        self.derive(|f| f.user_agent = Some(user_agent.to_owned()))
    }

    fn bytes_written(&self, bytes: u64) -> Self {
        self.derive(|f| f.bytes_written = Some(bytes))
    }

    fn host(&self, host: &str) -> Self {
        self.derive(|f| f.host = Some(host.to_owned()))
    }

    fn info(&self, msg: &str) {
        self.emit(Level::INFO, msg, None);
    }

    fn warn(&self, msg: &str) {
        self.emit(Level::WARN, msg, None);
    }

    fn debug(&self, msg: &str) {
        self.emit(Level::DEBUG, msg, None);
    }

    fn error(&self, msg: &str, error: impl fmt::Display) {
        self.emit(Level::ERROR, msg, Some(error.to_string()));
    }

    fn fatal(&self, msg: &str, error: impl fmt::Display) {
        self.emit(Level::ERROR, msg, Some(error.to_string()));
        process::exit(1);
    }

    fn panic(&self, msg: &str) {
        self.emit(Level::ERROR, msg, None);
        panic!("{msg}");
    }
}

/// Discarding [`StatusSink`] used by the silent coordinator shape and tests.
///
/// Terminal calls are dropped as well: `fatal` does not exit and `panic`
/// does not unwind.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl StatusSink for NoopSink {
    fn event(&self, _name: &str) -> Self {
        Self
    }

    fn signal(&self, _signal: impl fmt::Display) -> Self {
        Self
    }

    fn duration(&self, _duration: Duration) -> Self {
        Self
    }

    fn status_code(&self, _code: u16) -> Self {
        Self
    }

    fn remote_addr(&self, _addr: &str) -> Self {
        Self
    }

    fn request_id(&self, _id: &str) -> Self {
        Self
    }

    fn method(&self, _method: &str) -> Self {
        Self
    }

    fn uri(&self, _uri: &str) -> Self {
        Self
    }

    fn user_agent(&self, _user_agent: &str) -> Self {
        Self
    }

    fn bytes_written(&self, _bytes: u64) -> Self {
        Self
    }

    fn host(&self, _host: &str) -> Self {
        Self
    }

    fn info(&self, _msg: &str) {}

    fn warn(&self, _msg: &str) {}

    fn debug(&self, _msg: &str) {}

    fn error(&self, _msg: &str, _error: impl fmt::Display) {}

    fn fatal(&self, _msg: &str, _error: impl fmt::Display) {}

    fn panic(&self, _msg: &str) {}
}

fn install_subscriber(level: LogLevel, format: LogFormat, file: Option<(&Path, &str)>) {
    // Honour the KEELSON_LOG directive first, then RUST_LOG, then the level
    // requested at construction.
    let filter = match std::env::var(LOG_ENV) {
        Ok(directive) => EnvFilter::try_new(directive).unwrap_or_else(|err| {
            eprintln!(
                "invalid {} directive ({}); defaulting to {} logging",
                LOG_ENV,
                err,
                level.directive()
            );
            EnvFilter::new(level.directive())
        }),
        Err(_) => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.directive())),
    };

    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let _ = STDOUT_GUARD.set(stdout_guard);

    let fmt_layer = match format {
        LogFormat::StructuredJson => subscriber_fmt::layer()
            .with_target(true)
            .with_timer(subscriber_fmt::time::UtcTime::rfc_3339())
            .json()
            .with_writer(stdout_writer)
            .boxed(),
        LogFormat::Pretty => subscriber_fmt::layer()
            .with_target(true)
            .with_timer(subscriber_fmt::time::UtcTime::rfc_3339())
            .with_writer(stdout_writer)
            .boxed(),
    };

    let file_layer = file.map(|(directory, service)| {
        let appender = daily(directory, format!("{}.log", service));
        let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(file_guard);
        subscriber_fmt::layer()
            .with_target(true)
            .with_timer(subscriber_fmt::time::UtcTime::rfc_3339())
            .json()
            .with_writer(file_writer)
            .boxed()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(file_layer)
        .try_init()
        .ok();
}
