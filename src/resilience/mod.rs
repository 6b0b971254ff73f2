//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! RetryingExecutor::execute_async / execute_blocking
//!     → executor.rs (attempt loop, one RetryState per execution)
//!     → timeouts.rs (run one attempt under the per-attempt timeout)
//!     → policy.rs (classify outcome, decide Stop | RetryAfter(delay))
//!     → backoff.rs (exponential delay, full jitter)
//!     → discard outcome (close body), sleep, next attempt
//! ```
//!
//! # Design Decisions
//! - Exactly one attempt is in flight per execution at a time
//! - Non-replayable bodies are never re-sent; the first failure is final
//! - Retrying non-idempotent methods is allowed unless `idempotent_only` is set
//! - Policy is immutable and shared; state is per execution

pub mod backoff;
pub mod executor;
pub mod policy;
pub mod service;
pub mod state;
pub mod timeouts;

pub use executor::{BuildError, RetryingExecutor};
pub use policy::{
    Classifier, Decision, PolicyError, RetryPolicy, RetryPolicyBuilder, Retryability, StatusClassifier,
    StopReason,
};
pub use state::{AttemptOutcome, ExecutionId, RetryState};
