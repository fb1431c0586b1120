//! ---
//! ksn_section: "01-service-lifecycle"
//! ksn_subsection: "integration-test"
//! ksn_type: "source"
//! ksn_scope: "test"
//! ksn_description: "Signal-driven coordinator behavior."
//! ksn_version: "v0.0.0-prealpha"
//! ksn_owner: "tbd"
//! ---
//! Signal delivery is process-wide, so every test that raises one holds
//! `SIGNAL_LOCK` for its whole body. The sleeps before each raise give the
//! spawned coordinator time to register its signal streams.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use keelson_logging::StatusSink;
use keelson_shutdown::{wait, wait_with_status, CancellationToken, ShutdownError};
use nix::sys::signal::{raise, Signal};

static SIGNAL_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

const REGISTRATION_GRACE: Duration = Duration::from_millis(50);

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sigint_unblocks_wait_after_callback_completes() {
    let _guard = SIGNAL_LOCK.lock().await;

    let token = CancellationToken::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in_callback = calls.clone();
    let waiter = tokio::spawn(wait(token.clone(), move |_token| async move {
        calls_in_callback.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(())
    }));

    tokio::time::sleep(REGISTRATION_GRACE).await;
    let raised_at = Instant::now();
    raise(Signal::SIGINT).expect("raise SIGINT");

    let outcome = waiter.await.expect("waiter task");
    assert!(outcome.is_ok());
    assert!(raised_at.elapsed() >= Duration::from_millis(10));
    assert!(raised_at.elapsed() < Duration::from_millis(500));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(token.is_cancelled());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sigterm_wraps_callback_error_with_context() {
    let _guard = SIGNAL_LOCK.lock().await;

    let token = CancellationToken::new();
    let waiter = tokio::spawn(wait(token, |_token| async {
        Err(anyhow::anyhow!("disk flush failed"))
    }));

    tokio::time::sleep(REGISTRATION_GRACE).await;
    raise(Signal::SIGTERM).expect("raise SIGTERM");

    let err = waiter
        .await
        .expect("waiter task")
        .expect_err("callback failure must surface");
    let msg = err.to_string();
    assert!(msg.contains("could not terminate gracefully"));
    assert!(msg.contains("disk flush failed"));

    match err {
        ShutdownError::Termination { source } => {
            assert_eq!(source.to_string(), "disk flush failed");
        }
        other => panic!("unexpected error variant: {other}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn external_cancellation_runs_callback_but_wait_still_needs_a_signal() {
    let _guard = SIGNAL_LOCK.lock().await;

    let token = CancellationToken::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in_callback = calls.clone();
    let (ran_tx, ran_rx) = tokio::sync::oneshot::channel();
    let waiter = tokio::spawn(wait(token.clone(), move |_token| async move {
        calls_in_callback.fetch_add(1, Ordering::SeqCst);
        ran_tx.send(()).ok();
        Ok(())
    }));

    tokio::time::sleep(REGISTRATION_GRACE).await;

    // Some other subsystem cancels the shared token before any signal.
    token.cancel();
    ran_rx.await.expect("callback runs on external cancellation");
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished(), "wait must not return without a signal");

    raise(Signal::SIGINT).expect("raise SIGINT");
    let outcome = waiter.await.expect("waiter task");
    assert!(outcome.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn double_cancellation_neither_reruns_callback_nor_deadlocks() {
    let _guard = SIGNAL_LOCK.lock().await;

    let token = CancellationToken::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in_callback = calls.clone();
    let waiter = tokio::spawn(wait(token.clone(), move |_token| async move {
        calls_in_callback.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));

    tokio::time::sleep(REGISTRATION_GRACE).await;
    token.cancel();
    raise(Signal::SIGTERM).expect("raise SIGTERM");

    // The coordinator cancels again after the signal; the second trigger
    // must have no further effect.
    let outcome = tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .expect("wait must not deadlock")
        .expect("waiter task");
    assert!(outcome.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn status_events_fire_in_order_with_the_received_signal() {
    let _guard = SIGNAL_LOCK.lock().await;

    let sink = RecordingSink::default();
    let records = sink.records.clone();
    let token = CancellationToken::new();
    let waiter = tokio::spawn(wait_with_status(
        token,
        |_token| async { Ok(()) },
        sink,
    ));

    tokio::time::sleep(REGISTRATION_GRACE).await;
    raise(Signal::SIGINT).expect("raise SIGINT");
    waiter.await.expect("waiter task").expect("clean teardown");

    let records = records.lock().expect("records");
    let expected = [
        "Starting graceful shutdown process",
        "Propagating cancellation",
        "Cancellation propagated",
        "Shutdown process complete",
    ];
    assert_eq!(records.len(), expected.len());
    for (record, expected_msg) in records.iter().zip(expected) {
        assert_eq!(record.event.as_deref(), Some("shutdown"));
        assert_eq!(record.signal.as_deref(), Some("SIGINT"));
        assert_eq!(record.message, expected_msg);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_teardown_skips_the_completion_event() {
    let _guard = SIGNAL_LOCK.lock().await;

    let sink = RecordingSink::default();
    let records = sink.records.clone();
    let token = CancellationToken::new();
    let waiter = tokio::spawn(wait_with_status(
        token,
        |_token| async { Err(anyhow::anyhow!("drain timed out")) },
        sink,
    ));

    tokio::time::sleep(REGISTRATION_GRACE).await;
    raise(Signal::SIGTERM).expect("raise SIGTERM");
    let err = waiter
        .await
        .expect("waiter task")
        .expect_err("callback failure must surface");
    assert!(err.to_string().contains("drain timed out"));

    let records = records.lock().expect("records");
    assert_eq!(records.len(), 3);
    assert!(records
        .iter()
        .all(|r| r.signal.as_deref() == Some("SIGTERM")));
}

#[derive(Debug)]
struct Record {
    event: Option<String>,
    signal: Option<String>,
    message: String,
}

/// Sink that appends every emitted record to a shared vector.
#[derive(Clone, Default)]
struct RecordingSink {
    records: Arc<Mutex<Vec<Record>>>,
    event: Option<String>,
    signal: Option<String>,
}

impl RecordingSink {
    fn push(&self, message: &str) {
        self.records.lock().expect("records").push(Record {
            event: self.event.clone(),
            signal: self.signal.clone(),
            message: message.to_owned(),
        });
    }
}

impl StatusSink for RecordingSink {
    fn event(&self, name: &str) -> Self {
        let mut link = self.clone();
        link.event = Some(name.to_owned());
        link
    }

    fn signal(&self, signal: impl fmt::Display) -> Self {
        let mut link = self.clone();
        link.signal = Some(signal.to_string());
        link
    }

    fn duration(&self, _duration: Duration) -> Self {
        self.clone()
    }

    fn status_code(&self, _code: u16) -> Self {
        self.clone()
    }

    fn remote_addr(&self, _addr: &str) -> Self {
        self.clone()
    }

    fn request_id(&self, _id: &str) -> Self {
        self.clone()
    }

    fn method(&self, _method: &str) -> Self {
        self.clone()
    }

    fn uri(&self, _uri: &str) -> Self {
        self.clone()
    }

    fn user_agent(&self, _user_agent: &str) -> Self {
        self.clone()
    }

    fn bytes_written(&self, _bytes: u64) -> Self {
        self.clone()
    }

    fn host(&self, _host: &str) -> Self {
        self.clone()
    }

    fn info(&self, msg: &str) {
        self.push(msg);
    }

    fn warn(&self, msg: &str) {
        self.push(msg);
    }

    fn debug(&self, msg: &str) {
        self.push(msg);
    }

    fn error(&self, msg: &str, _error: impl fmt::Display) {
        self.push(msg);
    }

    fn fatal(&self, msg: &str, _error: impl fmt::Display) {
        self.push(msg);
    }

    fn panic(&self, msg: &str) {
        self.push(msg);
    }
}
