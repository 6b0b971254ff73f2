//! Per-execution retry state.
//!
//! # Responsibilities
//! - Identify each execution for tracing
//! - Track attempt number, start time and accumulated backoff
//! - Carry the outcome of a single attempt
//!
//! # Design Decisions
//! - `RetryState` is owned by exactly one execution and never shared
//! - Attempts are numbered from 1

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

use crate::error::AttemptError;
use crate::http::Response;
use crate::transport::TransportError;

/// Global counter for execution IDs.
static EXECUTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecutionId(u64);

impl ExecutionId {
    pub fn new() -> Self {
        Self(EXECUTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exec-{}", self.0)
    }
}

/// Result of one transport invocation.
#[derive(Debug)]
pub enum AttemptOutcome {
    /// The transport produced a response (of any status).
    Success(Response),
    /// The transport failed before producing a response.
    TransportFailure(TransportError),
    /// The per-attempt timeout fired.
    Timeout(Duration),
}

impl AttemptOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Success(_) => "response",
            AttemptOutcome::TransportFailure(_) => "transport_failure",
            AttemptOutcome::Timeout(_) => "timeout",
        }
    }

    pub fn response(&self) -> Option<&Response> {
        match self {
            AttemptOutcome::Success(response) => Some(response),
            _ => None,
        }
    }

    /// Convert a failed outcome into the cause reported to the caller.
    ///
    /// A response keeps its status and headers; its body is closed.
    pub fn into_cause(self) -> AttemptError {
        match self {
            AttemptOutcome::Success(response) => AttemptError::Status(response.without_body()),
            AttemptOutcome::TransportFailure(err) => AttemptError::Transport(err),
            AttemptOutcome::Timeout(limit) => AttemptError::Timeout(limit),
        }
    }

    /// Drop the outcome, closing any response body it holds.
    pub fn discard(self) {
        if let AttemptOutcome::Success(response) = self {
            response.close();
        }
    }
}

/// Mutable state of one execution's retry loop.
#[derive(Debug)]
pub struct RetryState {
    id: ExecutionId,
    attempt: u32,
    started: Instant,
    total_backoff: Duration,
    last_outcome: Option<&'static str>,
}

impl RetryState {
    pub fn new(id: ExecutionId) -> Self {
        Self {
            id,
            attempt: 1,
            started: Instant::now(),
            total_backoff: Duration::ZERO,
            last_outcome: None,
        }
    }

    pub fn id(&self) -> ExecutionId {
        self.id
    }

    /// Current attempt number, starting at 1.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    /// Sum of all backoff delays waited so far.
    pub fn total_backoff(&self) -> Duration {
        self.total_backoff
    }

    pub fn last_outcome(&self) -> Option<&'static str> {
        self.last_outcome
    }

    pub fn record(&mut self, outcome: &AttemptOutcome) {
        self.last_outcome = Some(outcome.label());
    }

    /// Move on to the next attempt after waiting `delay`.
    pub fn advance(&mut self, delay: Duration) {
        self.attempt += 1;
        self.total_backoff += delay;
    }
}
