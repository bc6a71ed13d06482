use std::thread;
use std::time::Duration;

use futures::executor::block_on;
use tether::config::LoopConfig;
use tether::scheduler::dedicated::{Initializer, LoopHandle, LoopThread};
use tether_api::errors::LoopError;
use tether_api::signal::ShutdownSignal;
use tether_api::types::{InitFuture, LoopState};

const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

fn initializer<F>(f: F) -> Initializer
where
    F: FnOnce(&LoopHandle, &ShutdownSignal) -> Option<InitFuture> + Send + 'static,
{
    Box::new(f)
}

#[test]
fn test_start_runs_loop_and_accepts_work() {
    let thread = LoopThread::new("worker-a", LoopConfig::default());
    assert_eq!(thread.state(), LoopState::Created);
    assert!(thread.handle().is_none());

    thread.start(None).unwrap();
    assert_eq!(thread.state(), LoopState::Running);

    let handle = thread.handle().expect("handle is available after start");
    assert_eq!(handle.name(), "worker-a");
    let answer = block_on(handle.spawn(async { 40 + 2 })).unwrap();
    assert_eq!(answer, 42);

    let name = block_on(handle.spawn(async { thread::current().name().map(str::to_string) })).unwrap();
    assert_eq!(name.as_deref(), Some("tether-loop-worker-a"));

    assert!(thread.stop());
    assert!(thread.join(JOIN_TIMEOUT));
    assert_eq!(thread.state(), LoopState::Terminated);
}

#[test]
fn test_initializer_runs_once_on_loop_thread() {
    let (tx, rx) = flume::unbounded::<Option<String>>();
    let thread = LoopThread::new("init", LoopConfig::default());

    thread
        .start(Some(initializer(move |_handle: &LoopHandle, _shutdown: &ShutdownSignal| {
            tx.send(thread::current().name().map(str::to_string)).unwrap();
            None
        })))
        .unwrap();

    let seen = rx.recv_timeout(JOIN_TIMEOUT).unwrap();
    assert_eq!(seen.as_deref(), Some("tether-loop-init"));
    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

    thread.stop();
    assert!(thread.join(JOIN_TIMEOUT));
}

#[test]
fn test_initializer_future_is_driven_on_loop() {
    let (tx, rx) = flume::unbounded::<&'static str>();
    let thread = LoopThread::new("init-future", LoopConfig::default());

    thread
        .start(Some(initializer(move |handle: &LoopHandle, _shutdown: &ShutdownSignal| {
            let background = tx.clone();
            handle.spawn(async move {
                background.send("spawned").unwrap();
            });
            let setup: InitFuture = Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                tx.send("awaited").unwrap();
            });
            Some(setup)
        })))
        .unwrap();

    let mut seen = vec![
        rx.recv_timeout(JOIN_TIMEOUT).unwrap(),
        rx.recv_timeout(JOIN_TIMEOUT).unwrap(),
    ];
    seen.sort();
    assert_eq!(seen, vec!["awaited", "spawned"]);

    thread.stop();
    assert!(thread.join(JOIN_TIMEOUT));
}

#[test]
fn test_stop_is_idempotent() {
    let thread = LoopThread::new("stop-twice", LoopConfig::default());
    thread.start(None).unwrap();
    let handle = thread.handle().unwrap();

    assert!(thread.stop());
    assert!(!thread.stop());
    assert!(handle.is_closed());
    assert!(thread.join(JOIN_TIMEOUT));

    // Stopping a terminated thread neither faults nor changes state
    assert!(!thread.stop());
    assert_eq!(thread.state(), LoopState::Terminated);
}

#[test]
fn test_stop_before_start_is_noop() {
    let thread = LoopThread::new("never-started", LoopConfig::default());
    assert!(!thread.stop());
    assert_eq!(thread.state(), LoopState::Created);
    assert!(!thread.join(Duration::from_millis(10)));

    // It can still be started afterwards
    thread.start(None).unwrap();
    assert_eq!(thread.state(), LoopState::Running);
    thread.stop();
    assert!(thread.join(JOIN_TIMEOUT));
}

#[test]
fn test_second_start_is_rejected() {
    let thread = LoopThread::new("twice", LoopConfig::default());
    thread.start(None).unwrap();

    match thread.start(None) {
        Err(LoopError::AlreadyStarted(name)) => assert_eq!(name, "twice"),
        other => panic!("expected AlreadyStarted, got {:?}", other),
    }

    thread.stop();
    assert!(thread.join(JOIN_TIMEOUT));
}

#[test]
fn test_pending_work_is_dropped_on_stop() {
    let thread = LoopThread::new("pending", LoopConfig::default());
    thread.start(None).unwrap();
    let handle = thread.handle().unwrap();

    let pending = handle.spawn(std::future::pending::<()>());
    thread.stop();
    assert!(thread.join(JOIN_TIMEOUT));

    let outcome = block_on(pending);
    assert!(outcome.unwrap_err().is_cancelled());

    // Work scheduled after termination never runs
    let late = block_on(handle.spawn(async { 1 }));
    assert!(late.is_err());
}

#[test]
fn test_stop_during_initializer_future_terminates_loop() {
    let thread = LoopThread::new("slow-init", LoopConfig::default());
    thread
        .start(Some(initializer(|_handle: &LoopHandle, _shutdown: &ShutdownSignal| {
            let forever: InitFuture = Box::pin(std::future::pending::<()>());
            Some(forever)
        })))
        .unwrap();

    assert!(thread.stop());
    assert!(thread.join(JOIN_TIMEOUT));
    assert_eq!(thread.state(), LoopState::Terminated);
}

#[test]
fn test_panicking_initializer_terminates_loop() {
    let thread = LoopThread::new("bad-init", LoopConfig::default());
    thread
        .start(Some(initializer(|_handle: &LoopHandle, _shutdown: &ShutdownSignal| -> Option<InitFuture> {
            panic!("initializer failed")
        })))
        .unwrap();

    assert!(thread.join(JOIN_TIMEOUT));
    assert_eq!(thread.state(), LoopState::Terminated);
}
