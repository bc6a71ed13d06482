use std::time::Duration;

use tether_api::signal::{ShutdownSignal, StopFlag};

#[test]
fn test_shutdown_signal_is_one_way_and_idempotent() {
    let signal = ShutdownSignal::new();
    assert!(!signal.is_triggered());

    assert!(signal.trigger());
    assert!(signal.is_triggered());

    // Second and third calls neither fault nor report a transition
    assert!(!signal.trigger());
    assert!(!signal.trigger());
    assert!(signal.is_triggered());
}

#[test]
fn test_shutdown_signal_clones_share_state() {
    let signal = ShutdownSignal::new();
    let clone = signal.clone();
    clone.trigger();
    assert!(signal.is_triggered());
    assert!(format!("{:?}", signal).contains("triggered: true"));
}

#[tokio::test]
async fn test_shutdown_signal_wait_resolves_after_trigger() {
    let signal = ShutdownSignal::new();
    let waiter = {
        let signal = signal.clone();
        tokio::spawn(async move { signal.wait().await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    signal.trigger();
    tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("wait should resolve after trigger")
        .unwrap();
}

#[tokio::test]
async fn test_shutdown_signal_wait_returns_immediately_when_already_triggered() {
    let signal = ShutdownSignal::new();
    signal.trigger();
    tokio::time::timeout(Duration::from_millis(100), signal.wait())
        .await
        .expect("already triggered signal should not block");
}

#[test]
fn test_stop_flag_set_once() {
    let flag = StopFlag::new();
    let shared = flag.clone();
    assert!(!flag.is_set());
    assert!(shared.set());
    assert!(!flag.set());
    assert!(flag.is_set());
}
