//! ---
//! ksn_section: "01-service-lifecycle"
//! ksn_subsection: "module"
//! ksn_type: "source"
//! ksn_scope: "code"
//! ksn_description: "Graceful-shutdown coordination for long-running services."
//! ksn_version: "v0.0.0-prealpha"
//! ksn_owner: "tbd"
//! ---
//! Graceful-shutdown coordination for Keelson services.
//!
//! A service hands [`wait`] the cancellation token it already shares with
//! its subsystems plus a termination callback, and blocks until SIGINT or
//! SIGTERM arrives:
//!
//! ```no_run
//! use keelson_shutdown::{wait, CancellationToken};
//!
//! # async fn run() -> Result<(), keelson_shutdown::ShutdownError> {
//! let token = CancellationToken::new();
//! // ... hand clones of `token` to the service's workers ...
//! wait(token, |token| async move {
//!     // drain in-flight work, bounded by the cancelled token
//!     drop(token);
//!     Ok(())
//! })
//! .await
//! # }
//! ```
//!
//! [`wait_with_status`] is the same coordinator with status events emitted
//! to a [`keelson_logging::StatusSink`] at each teardown stage.
#![warn(missing_docs)]

pub mod coordinator;

pub use coordinator::{wait, wait_with_status, ShutdownError, ShutdownSignal};
pub use tokio_util::sync::CancellationToken;
