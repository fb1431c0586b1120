//! ---
//! ksn_section: "01-service-lifecycle"
//! ksn_subsection: "module"
//! ksn_type: "source"
//! ksn_scope: "code"
//! ksn_description: "Signal wait, cancellation propagation, and teardown aggregation."
//! ksn_version: "v0.0.0-prealpha"
//! ksn_owner: "tbd"
//! ---
use std::fmt;
use std::future::Future;

use keelson_logging::{NoopSink, StatusSink};
use thiserror::Error;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

/// Errors surfaced by [`wait`] and [`wait_with_status`].
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// OS signal registration failed before the wait began. Passed through
    /// untranslated; this layer adds no semantics to it.
    #[error(transparent)]
    SignalRegistration(#[from] std::io::Error),

    /// The termination callback reported a failure.
    #[error("could not terminate gracefully: {source}")]
    Termination {
        /// The callback's own error, preserved as the cause.
        source: anyhow::Error,
    },
}

/// Identity of the termination signal that unblocked the coordinator.
///
/// Only ever observed through the status sink; the coordinator takes no
/// signal-specific decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGINT.
    Interrupt,
    /// SIGTERM.
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShutdownSignal::Interrupt => "SIGINT",
            ShutdownSignal::Terminate => "SIGTERM",
        })
    }
}

/// Suspend until SIGINT or SIGTERM arrives, then run `on_terminate` to
/// completion and surface its outcome.
///
/// The caller owns `token` and may share it with any number of subsystems.
/// The coordinator spawns a background task that waits for the token's
/// done-notification and then invokes `on_terminate` with the cancelled
/// token, so the callback can bound its own sub-operations on it. On signal
/// receipt the coordinator cancels the token itself; a token cancelled
/// earlier by some other holder reaches the callback the same way, but the
/// wait still returns only after a signal arrives.
///
/// Signal subscriptions live for the duration of this call and are released
/// on every exit path. No timeout is imposed anywhere: a callback that never
/// returns hangs the coordinator.
///
/// # Errors
///
/// Returns [`ShutdownError::Termination`] wrapping the callback's error, or
/// [`ShutdownError::SignalRegistration`] if a signal stream could not be
/// registered.
pub async fn wait<F, Fut>(token: CancellationToken, on_terminate: F) -> Result<(), ShutdownError>
where
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    wait_with_status(token, on_terminate, NoopSink).await
}

/// [`wait`], with status events emitted to `sink` at each stage of the
/// teardown.
///
/// Emits four `shutdown` events carrying the received signal identity, in
/// this order: "Starting graceful shutdown process", "Propagating
/// cancellation", "Cancellation propagated", "Shutdown process complete"
/// (the last one only on a clean teardown). Each event is emitted from the
/// calling task, strictly after the previous one returned.
///
/// # Errors
///
/// Same contract as [`wait`].
pub async fn wait_with_status<S, F, Fut>(
    token: CancellationToken,
    on_terminate: F,
    sink: S,
) -> Result<(), ShutdownError>
where
    S: StatusSink,
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    // Subscribe before the first suspension point so a signal delivered
    // just ahead of the wait is latched rather than lost.
    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    let term_token = token.clone();
    let termination = tokio::spawn(async move {
        // Unblocked by the cancel below or by any other holder of the
        // token; both origins are handled identically.
        term_token.cancelled().await;
        on_terminate(term_token).await
    });

    let received = tokio::select! {
        _ = terminate.recv() => ShutdownSignal::Terminate,
        _ = interrupt.recv() => ShutdownSignal::Interrupt,
    };

    sink.event("shutdown")
        .signal(received)
        .info("Starting graceful shutdown process");
    sink.event("shutdown")
        .signal(received)
        .info("Propagating cancellation");
    token.cancel();
    sink.event("shutdown")
        .signal(received)
        .info("Cancellation propagated");

    let outcome = match termination.await {
        Ok(outcome) => outcome,
        Err(join) => {
            if join.is_panic() {
                std::panic::resume_unwind(join.into_panic());
            }
            Err(anyhow::Error::new(join))
        }
    };

    match outcome {
        Ok(()) => {
            sink.event("shutdown")
                .signal(received)
                .info("Shutdown process complete");
            Ok(())
        }
        Err(source) => Err(ShutdownError::Termination { source }),
    }
}
