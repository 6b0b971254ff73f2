//! Per-attempt timeout enforcement.
//!
//! # Responsibilities
//! - Run one transport invocation, optionally bounded by a timeout
//! - Turn the result into an [`AttemptOutcome`]
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the in-flight call is dropped on expiry
//! - Timeouts are distinct from transport errors so the classifier can tell them apart

use std::time::Duration;

use crate::http::Request;
use crate::resilience::state::AttemptOutcome;
use crate::transport::TransportExecutor;

/// Invoke `transport` once for `request`.
pub async fn run_attempt(
    transport: &dyn TransportExecutor,
    request: &Request,
    limit: Option<Duration>,
) -> AttemptOutcome {
    let call = transport.execute(request);
    let result = match limit {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => return AttemptOutcome::Timeout(limit),
        },
        None => call.await,
    };

    match result {
        Ok(response) => AttemptOutcome::Success(response),
        Err(err) => AttemptOutcome::TransportFailure(err),
    }
}
