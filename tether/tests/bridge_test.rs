use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use futures::executor::block_on;
use tether::bridge::{run_sync, run_sync_on, try_run_sync_on};
use tether::config::PoolConfig;
use tether::context::{self, ExecutionContext};
use tether::scheduler::dedicated::LoopRegistry;
use tether::scheduler::elastic::ElasticPool;
use tether_api::errors::TaskError;

#[derive(Debug, PartialEq)]
enum LookupError {
    NotFound(String),
    Task(TaskError),
}

impl From<TaskError> for LookupError {
    fn from(err: TaskError) -> Self {
        LookupError::Task(err)
    }
}

fn pool() -> ElasticPool {
    ElasticPool::new(PoolConfig::default().with_core_size(2))
}

#[tokio::test]
async fn test_run_sync_returns_value() {
    let pool = pool();
    let value = run_sync_on(&pool, || (1..=10u32).product::<u32>()).await;
    assert_eq!(value, Ok(3_628_800));
}

#[tokio::test]
async fn test_run_sync_uses_default_pool() {
    let name = run_sync(|| thread::current().name().map(str::to_string)).await.unwrap();
    assert!(name.unwrap_or_default().starts_with("tether-worker"));
}

#[tokio::test]
async fn test_panic_surfaces_at_await_point() {
    let pool = pool();
    let outcome = run_sync_on(&pool, || -> u8 { panic!("bad input: {}", 7) }).await;
    assert_eq!(outcome, Err(TaskError::Panicked("bad input: 7".to_string())));
}

#[tokio::test]
async fn test_try_run_sync_flattens_errors() {
    let pool = pool();

    let found = try_run_sync_on(&pool, || Ok::<_, LookupError>("row")).await;
    assert_eq!(found, Ok("row"));

    let missing = try_run_sync_on(&pool, || Err::<&str, _>(LookupError::NotFound("id-9".into()))).await;
    assert_eq!(missing, Err(LookupError::NotFound("id-9".into())));

    let crashed = try_run_sync_on(&pool, || -> Result<&str, LookupError> { panic!("driver crashed") }).await;
    assert!(matches!(crashed, Err(LookupError::Task(TaskError::Panicked(_)))));
}

#[tokio::test]
async fn test_loop_keeps_running_while_bridged() {
    let pool = pool();
    let ticks = Arc::new(AtomicUsize::new(0));

    let ticker = {
        let ticks = ticks.clone();
        tokio::spawn(async move {
            loop {
                ticks.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
    };

    run_sync_on(&pool, || thread::sleep(Duration::from_millis(150)))
        .await
        .unwrap();
    ticker.abort();

    // A blocked current-thread runtime would have ticked once at most
    assert!(ticks.load(Ordering::SeqCst) > 3);
}

#[tokio::test]
async fn test_context_is_visible_in_bridged_call() {
    let pool = pool();
    let seen = ExecutionContext::new()
        .with_value("tenant", "acme".to_string())
        .scope(async {
            run_sync_on(&pool, || context::get::<String>("tenant").map(|v| (*v).clone())).await
        })
        .await
        .unwrap();
    assert_eq!(seen.as_deref(), Some("acme"));
}

#[tokio::test]
async fn test_tasks_sharing_a_loop_keep_separate_contexts() {
    let pool = pool();
    let lookup = |label: &'static str| {
        let pool = pool.clone();
        ExecutionContext::new().with_value("label", label).scope(async move {
            tokio::task::yield_now().await;
            run_sync_on(&pool, || context::get::<&'static str>("label").map(|v| *v))
                .await
                .unwrap()
        })
    };

    let (left, right) = tokio::join!(lookup("left"), lookup("right"));
    assert_eq!(left, Some("left"));
    assert_eq!(right, Some("right"));
}

#[test]
fn test_bridge_from_dedicated_loop() {
    let pool = pool();
    let registry = LoopRegistry::default();
    let handle = registry.get_or_create("bridge-loop").unwrap();

    let worker = {
        let pool = pool.clone();
        handle.spawn(async move {
            let loop_thread = thread::current().name().map(str::to_string);
            let worker_thread = run_sync_on(&pool, || thread::current().name().map(str::to_string))
                .await
                .unwrap();
            (loop_thread, worker_thread)
        })
    };

    let (loop_thread, worker_thread) = block_on(worker).unwrap();
    assert_eq!(loop_thread.as_deref(), Some("tether-loop-bridge-loop"));
    assert_ne!(loop_thread, worker_thread);

    registry.stop_all(Duration::from_secs(2));
}
