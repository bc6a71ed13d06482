use std::time::Duration;

use tether::config::{
    DEFAULT_CORE_POOL_SIZE, DEFAULT_POLL_ATTEMPT_TIMEOUT, DEFAULT_SETTLE_TIMEOUT, LoopConfig, OverflowPolicy,
    PoolConfig, SystemConfig,
};
use tether::scheduler::elastic::ElasticPool;

#[test]
fn test_default_values() {
    let config = SystemConfig::default();
    assert_eq!(config.pool.core_size, DEFAULT_CORE_POOL_SIZE);
    assert_eq!(config.pool.core_size, 30);
    assert_eq!(config.pool.max_transient, None);
    assert_eq!(config.pool.overflow_policy, OverflowPolicy::Reject);
    assert_eq!(config.loops.settle_timeout, DEFAULT_SETTLE_TIMEOUT);
    assert_eq!(config.poll.attempt_timeout, DEFAULT_POLL_ATTEMPT_TIMEOUT);
    assert_eq!(config.poll.attempt_timeout, Duration::from_secs(1));
}

#[test]
fn test_builders() {
    let config = PoolConfig::default()
        .with_core_size(4)
        .with_transient_limit(16, OverflowPolicy::Queue);
    assert_eq!(config.core_size, 4);
    assert_eq!(config.max_transient, Some(16));
    assert_eq!(config.overflow_policy, OverflowPolicy::Queue);

    assert_eq!(PoolConfig::per_cpu().core_size, num_cpus::get());
}

#[test]
fn test_shutdown_timeout_covers_loops_and_pool() {
    let config = SystemConfig {
        pool: PoolConfig {
            shutdown_timeout: Duration::from_secs(3),
            ..PoolConfig::default()
        },
        loops: LoopConfig {
            shutdown_timeout: Duration::from_millis(250),
            ..LoopConfig::default()
        },
        ..SystemConfig::default()
    };
    assert_eq!(config.shutdown_timeout(), Duration::from_millis(3250));
}

#[test]
fn test_zero_core_size_is_clamped() {
    let pool = ElasticPool::new(PoolConfig::default().with_core_size(0));
    assert_eq!(pool.core_size(), 1);
}
