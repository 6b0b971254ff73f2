//! Metrics collection.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! embedding application installs a recorder.
//!
//! # Metrics
//! - `http_executor_attempts_total` (counter): transport invocations by transport
//! - `http_executor_retries_total` (counter): scheduled retries by transport, outcome
//! - `http_executor_executions_total` (counter): finished executions by outcome
//! - `http_executor_execution_duration_seconds` (histogram): execution latency by outcome

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

static ENABLED: AtomicBool = AtomicBool::new(true);

/// Turn recording on or off process-wide.
pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

pub fn record_attempt(transport: &str) {
    if !is_enabled() {
        return;
    }
    metrics::counter!("http_executor_attempts_total", "transport" => transport.to_string()).increment(1);
}

pub fn record_retry(transport: &str, outcome: &'static str) {
    if !is_enabled() {
        return;
    }
    metrics::counter!(
        "http_executor_retries_total",
        "transport" => transport.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a finished execution and its latency.
pub fn record_execution(outcome: &'static str, elapsed: Duration) {
    if !is_enabled() {
        return;
    }
    metrics::counter!("http_executor_executions_total", "outcome" => outcome).increment(1);
    metrics::histogram!("http_executor_execution_duration_seconds", "outcome" => outcome)
        .record(elapsed.as_secs_f64());
}

pub fn record_execution_cancelled() {
    if !is_enabled() {
        return;
    }
    metrics::counter!("http_executor_executions_total", "outcome" => "cancelled").increment(1);
}
