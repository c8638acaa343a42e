#![allow(dead_code)]

pub mod scripted_rpc;
pub mod strategies;

use trade_resilience::config::ResilienceConfig;

/// Defaults with the knobs integration tests usually turn
pub fn test_config(max_retries: u32, failure_threshold: u32) -> ResilienceConfig {
    let mut config = ResilienceConfig::default();
    config.retry.max_retries = max_retries;
    config.circuit_breaker.failure_threshold = failure_threshold;
    config.circuit_breaker.cooldown_seconds = 60;
    config
}
