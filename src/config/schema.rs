//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the resilient HTTP client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Retry policy settings.
    pub retries: RetryConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Transport backend selection and tuning.
    pub transport: TransportConfig,

    /// Shared worker pool settings.
    pub worker_pool: WorkerPoolConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries. When disabled every execution makes a single attempt.
    pub enabled: bool,

    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Growth factor applied per attempt.
    pub multiplier: f64,

    /// Randomize each delay uniformly within [0, delay].
    pub jitter: bool,

    /// Overall deadline for an execution in milliseconds.
    pub deadline_ms: Option<u64>,

    /// Response status codes treated as retryable failures.
    pub retryable_statuses: Vec<u16>,

    /// Honor `Retry-After` (delta-seconds) on retryable responses.
    pub respect_retry_after: bool,

    /// Only retry idempotent methods (GET, PUT, DELETE, HEAD, OPTIONS).
    pub idempotent_only: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
            multiplier: 2.0,
            jitter: true,
            deadline_ms: None,
            retryable_statuses: vec![429, 502, 503, 504],
            respect_retry_after: true,
            idempotent_only: false,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in milliseconds.
    pub connect_ms: u64,

    /// Per-attempt timeout in milliseconds (0 disables it).
    pub attempt_ms: u64,

    /// Idle pooled connection timeout in seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 5_000,
            attempt_ms: 30_000,
            idle_secs: 60,
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn attempt(&self) -> Option<Duration> {
        (self.attempt_ms > 0).then(|| Duration::from_millis(self.attempt_ms))
    }

    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }
}

/// Transport backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Registered backend name ("hyper" or "reqwest" by default).
    pub backend: String,

    /// `User-Agent` sent when the request does not set one.
    pub user_agent: String,

    /// Maximum idle pooled connections per host.
    pub pool_max_idle_per_host: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            backend: "hyper".to_string(),
            user_agent: concat!("resilient-http/", env!("CARGO_PKG_VERSION")).to_string(),
            pool_max_idle_per_host: 32,
        }
    }
}

/// Shared worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Worker threads of the shared pool (bounded parallelism).
    pub worker_threads: usize,

    /// Thread name prefix.
    pub thread_name: String,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            thread_name: "resilient-http-worker".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Record metrics through the `metrics` facade.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
        }
    }
}

/// Log formatter selection.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Compact,
}
