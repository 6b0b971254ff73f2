//! Error types surfaced to callers of the retrying executor.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::http::Response;
use crate::transport::TransportError;

/// Why the final attempt failed.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    /// The server answered with a status the classifier treats as retryable.
    /// The response body has already been closed.
    #[error("server responded with status {}", .0.status())]
    Status(Response),
}

impl AttemptError {
    pub fn response(&self) -> Option<&Response> {
        match self {
            AttemptError::Status(response) => Some(response),
            _ => None,
        }
    }

    pub fn into_response(self) -> Option<Response> {
        match self {
            AttemptError::Status(response) => Some(response),
            _ => None,
        }
    }

    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            AttemptError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

/// Why a failed request was not attempted again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonRetryableReason {
    /// The body is a one-shot stream that has already been consumed.
    BodyNotReplayable,
    /// Only idempotent methods may be retried and this one is not.
    NonIdempotentMethod,
    /// The classifier rejected the failure.
    Rejected,
}

impl fmt::Display for NonRetryableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            NonRetryableReason::BodyNotReplayable => "request body cannot be replayed",
            NonRetryableReason::NonIdempotentMethod => "method is not idempotent",
            NonRetryableReason::Rejected => "failure is not retryable",
        };
        f.write_str(reason)
    }
}

/// Terminal failure of an execution.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("request failed and will not be retried ({reason}) after {attempts} attempt(s)")]
    NonRetryableRequest {
        reason: NonRetryableReason,
        attempts: u32,
        #[source]
        cause: AttemptError,
    },

    #[error("retries exhausted after {attempts} attempt(s) in {elapsed:?}")]
    RetryExhausted {
        attempts: u32,
        elapsed: Duration,
        #[source]
        cause: AttemptError,
    },

    #[error("retry deadline exceeded after {attempts} attempt(s) in {elapsed:?}")]
    DeadlineExceeded {
        attempts: u32,
        elapsed: Duration,
        #[source]
        cause: AttemptError,
    },

    #[error("execution was cancelled")]
    Cancelled,

    #[error("failed to read response body")]
    Body(#[source] TransportError),

    #[error("failed to start worker runtime")]
    Runtime(#[source] std::io::Error),
}

impl ExecutionError {
    /// Failure of the last attempt, when one was made.
    pub fn cause(&self) -> Option<&AttemptError> {
        match self {
            ExecutionError::NonRetryableRequest { cause, .. }
            | ExecutionError::RetryExhausted { cause, .. }
            | ExecutionError::DeadlineExceeded { cause, .. } => Some(cause),
            _ => None,
        }
    }

    pub fn attempts(&self) -> Option<u32> {
        match self {
            ExecutionError::NonRetryableRequest { attempts, .. }
            | ExecutionError::RetryExhausted { attempts, .. }
            | ExecutionError::DeadlineExceeded { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExecutionError::Cancelled)
    }

    /// Short label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ExecutionError::NonRetryableRequest { .. } => "non_retryable",
            ExecutionError::RetryExhausted { .. } => "exhausted",
            ExecutionError::DeadlineExceeded { .. } => "deadline",
            ExecutionError::Cancelled => "cancelled",
            ExecutionError::Body(_) => "body",
            ExecutionError::Runtime(_) => "runtime",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportErrorKind;
    use http::StatusCode;
    use std::error::Error as _;

    #[test]
    fn test_exhausted_exposes_cause() {
        let err = ExecutionError::RetryExhausted {
            attempts: 3,
            elapsed: Duration::from_millis(350),
            cause: AttemptError::Status(Response::with_body(StatusCode::SERVICE_UNAVAILABLE, "")),
        };
        assert_eq!(err.attempts(), Some(3));
        assert_eq!(
            err.cause().and_then(|c| c.response()).map(|r| r.status()),
            Some(StatusCode::SERVICE_UNAVAILABLE)
        );
        assert_eq!(
            err.source().map(|s| s.to_string()),
            Some("server responded with status 503 Service Unavailable".to_string())
        );
    }

    #[test]
    fn test_non_retryable_message() {
        let err = ExecutionError::NonRetryableRequest {
            reason: NonRetryableReason::BodyNotReplayable,
            attempts: 1,
            cause: TransportError::new(TransportErrorKind::Connect, "refused").into(),
        };
        assert_eq!(
            err.to_string(),
            "request failed and will not be retried (request body cannot be replayed) after 1 attempt(s)"
        );
        assert_eq!(err.label(), "non_retryable");
    }

    #[test]
    fn test_cancelled_has_no_cause() {
        let err = ExecutionError::Cancelled;
        assert!(err.is_cancelled());
        assert!(err.cause().is_none());
        assert!(err.attempts().is_none());
    }
}
