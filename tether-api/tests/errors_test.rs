use std::time::Duration;

use anyhow::anyhow;
use tether_api::errors::*;

#[test]
fn test_task_error_display() {
    assert_eq!(TaskError::Panicked("boom".to_string()).to_string(), "Task panicked: boom");
    assert_eq!(
        TaskError::Rejected { live: 4, limit: 4 }.to_string(),
        "Task rejected: 4 transient threads live (limit 4)"
    );
    assert_eq!(TaskError::PoolShutdown.to_string(), "Worker pool is shut down");
    assert_eq!(TaskError::Spawn("EAGAIN".to_string()).to_string(), "Failed to spawn worker thread: EAGAIN");
    assert_eq!(TaskError::Dropped.to_string(), "Task was dropped before completing");
}

#[test]
fn test_task_error_from_panic_payloads() {
    let owned = std::panic::catch_unwind(|| panic!("owned {}", 42)).unwrap_err();
    assert_eq!(TaskError::from_panic(owned), TaskError::Panicked("owned 42".to_string()));

    let borrowed = std::panic::catch_unwind(|| panic!("static message")).unwrap_err();
    assert_eq!(TaskError::from_panic(borrowed), TaskError::Panicked("static message".to_string()));

    let opaque = std::panic::catch_unwind(|| std::panic::panic_any(7u32)).unwrap_err();
    assert_eq!(
        TaskError::from_panic(opaque),
        TaskError::Panicked("<non-string panic payload>".to_string())
    );
}

#[test]
fn test_loop_and_registry_error_display() {
    assert_eq!(LoopError::AlreadyStarted("db".to_string()).to_string(), "Loop thread 'db' was already started");
    assert_eq!(LoopError::Runtime("io".to_string()).to_string(), "Failed to build loop runtime: io");

    let timeout = RegistryError::Timeout { name: "db".to_string(), waited: Duration::from_secs(1) };
    assert_eq!(timeout.to_string(), "Loop 'db' did not register within 1s");
    assert_eq!(RegistryError::Aborted("db".to_string()).to_string(), "Loop 'db' terminated before registering");
    assert_eq!(RegistryError::Closed("db".to_string()).to_string(), "Loop 'db' not created: registry is shut down");
    assert_eq!(
        LoopError::ShuttingDown("detached-3".to_string()).to_string(),
        "Loop thread 'detached-3' not started: system is shutting down"
    );

    let wrapped: RegistryError = LoopError::Spawn("no threads".to_string()).into();
    assert_eq!(wrapped.to_string(), "Failed to spawn loop thread: no threads");
}

#[test]
fn test_queue_error_classification() {
    assert!(QueueError::Timeout.is_timeout());
    assert!(!QueueError::Disconnected.is_timeout());
    let other: QueueError = anyhow!("disk gone").into();
    assert!(!other.is_timeout());
    assert_eq!(other.to_string(), "Queue error: disk gone");
}

#[test]
fn test_system_error_conversions() {
    let from_task: SystemError = TaskError::PoolShutdown.into();
    assert_eq!(from_task.to_string(), "Task error: Worker pool is shut down");

    let from_registry: SystemError = RegistryError::Aborted("x".to_string()).into();
    assert!(from_registry.to_string().starts_with("Registry error:"));

    let other = SystemError::Other(anyhow!("some internal issue"));
    assert!(other.to_string().contains("some internal issue"));
    assert_eq!(SystemError::ShuttingDown.to_string(), "Bridge system is already shutting down");
}
