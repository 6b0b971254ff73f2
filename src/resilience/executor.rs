//! The retrying request executor.
//!
//! # Responsibilities
//! - Run the attempt loop: invoke transport, classify, back off, repeat
//! - Close the body of every discarded response
//! - Fail fast when a request cannot be safely re-sent
//! - Offer async (handle) and blocking entry points with identical semantics
//!
//! # Design Decisions
//! - The transport and policy are injected and shared; each execution owns its state
//! - Blocking execution is the async path driven on the calling thread
//! - Blocking results are buffered because the driving runtime ends with the call

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::runtime::Handle;
use tracing::Instrument;

use crate::config::ClientConfig;
use crate::error::{ExecutionError, NonRetryableReason};
use crate::http::{Request, Response};
use crate::observability::metrics;
use crate::resilience::policy::{Decision, PolicyError, RetryPolicy, StopReason};
use crate::resilience::state::{AttemptOutcome, ExecutionId, RetryState};
use crate::resilience::timeouts::run_attempt;
use crate::runtime::{ExecutionHandle, WorkerPool};
use crate::transport::{RegistryError, TransportExecutor, TransportRegistry};

/// Errors raised while assembling an executor from configuration.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Transport(#[from] RegistryError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("failed to start shared worker pool")]
    Pool(#[source] std::io::Error),
}

/// Executes requests through a transport, retrying per a [`RetryPolicy`].
#[derive(Clone)]
pub struct RetryingExecutor {
    transport: Arc<dyn TransportExecutor>,
    policy: RetryPolicy,
    attempt_timeout: Option<Duration>,
}

impl RetryingExecutor {
    pub fn new(transport: Arc<dyn TransportExecutor>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            attempt_timeout: None,
        }
    }

    /// Resolve the configured transport and build the policy and timeouts.
    ///
    /// The `[worker_pool]` section starts the shared pool used by
    /// [`RetryingExecutor::execute_async`] unless it is already running.
    pub fn from_config(config: &ClientConfig, registry: &TransportRegistry) -> Result<Self, BuildError> {
        let policy = RetryPolicy::from_config(&config.retries)?;
        let transport = registry.resolve(config)?;
        if !WorkerPool::configure_shared(&config.worker_pool).map_err(BuildError::Pool)? {
            tracing::debug!("Shared worker pool already running; keeping its settings");
        }
        Ok(Self::new(transport, policy).with_attempt_timeout(config.timeouts.attempt()))
    }

    /// Bound every attempt; `None` lets attempts run until the transport gives up.
    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn transport(&self) -> &Arc<dyn TransportExecutor> {
        &self.transport
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout
    }

    /// Start an execution on the shared worker pool.
    pub fn execute_async(&self, request: Request) -> ExecutionHandle {
        match WorkerPool::shared() {
            Ok(pool) => self.execute_async_on(request, pool),
            Err(err) => ExecutionHandle::failed(ExecutionId::new(), ExecutionError::Runtime(err)),
        }
    }

    /// Start an execution on `pool`.
    pub fn execute_async_on(&self, request: Request, pool: &WorkerPool) -> ExecutionHandle {
        let id = ExecutionId::new();
        let span = tracing::info_span!(
            "execution",
            execution_id = %id,
            method = %request.method(),
            url = %request.url(),
            transport = self.transport.name()
        );
        let executor = self.clone();
        let join = pool.spawn(async move { executor.run(id, request).await }.instrument(span));
        ExecutionHandle::spawned(id, join)
    }

    /// Execute on the calling thread and wait for the outcome.
    ///
    /// The response body is read into memory before returning.
    ///
    /// Inside a runtime context (a `spawn_blocking` closure, say) the
    /// execution is driven on a scoped helper thread, since a runtime cannot
    /// be started on a thread that has already entered one.
    pub fn execute_blocking(&self, request: Request) -> Result<Response, ExecutionError> {
        if Handle::try_current().is_err() {
            return self.drive_blocking(request);
        }
        std::thread::scope(|scope| {
            scope
                .spawn(|| self.drive_blocking(request))
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
        })
    }

    fn drive_blocking(&self, request: Request) -> Result<Response, ExecutionError> {
        let pool = WorkerPool::immediate().map_err(ExecutionError::Runtime)?;
        let handle = self.execute_async_on(request, &pool);
        pool.block_on(async move {
            let response = handle.await?;
            response.into_buffered().await.map_err(ExecutionError::Body)
        })
    }

    async fn run(self, id: ExecutionId, request: Request) -> Result<Response, ExecutionError> {
        let mut state = RetryState::new(id);
        let transport = self.transport.name().to_string();

        loop {
            metrics::record_attempt(&transport);
            let outcome = run_attempt(self.transport.as_ref(), &request, self.attempt_timeout).await;
            state.record(&outcome);
            let decision = self.policy.decide(state.attempt(), state.elapsed(), &outcome);

            let delay = match (outcome, decision) {
                (AttemptOutcome::Success(response), Decision::Stop(StopReason::NonRetryable)) => {
                    tracing::debug!(
                        attempt = state.attempt(),
                        status = response.status_code(),
                        "Execution completed"
                    );
                    metrics::record_execution("success", state.elapsed());
                    return Ok(response);
                }
                (outcome, Decision::Stop(reason)) => {
                    let err = self.stop_error(&state, reason, outcome);
                    tracing::warn!(
                        attempt = state.attempt(),
                        reason = reason.as_str(),
                        error = %err,
                        "Execution failed"
                    );
                    metrics::record_execution(err.label(), state.elapsed());
                    return Err(err);
                }
                (outcome, Decision::RetryAfter(delay)) => {
                    if let Some(reason) = self.retry_blocker(&request) {
                        let err = ExecutionError::NonRetryableRequest {
                            reason,
                            attempts: state.attempt(),
                            cause: outcome.into_cause(),
                        };
                        tracing::warn!(attempt = state.attempt(), error = %err, "Execution failed");
                        metrics::record_execution(err.label(), state.elapsed());
                        return Err(err);
                    }

                    tracing::info!(
                        attempt = state.attempt(),
                        outcome = outcome.label(),
                        delay_ms = delay.as_millis() as u64,
                        "Retrying request"
                    );
                    metrics::record_retry(&transport, outcome.label());
                    outcome.discard();
                    delay
                }
            };

            tokio::time::sleep(delay).await;
            state.advance(delay);
        }
    }

    /// Reason the request must not be sent again, if any.
    fn retry_blocker(&self, request: &Request) -> Option<NonRetryableReason> {
        if !request.is_replayable() {
            Some(NonRetryableReason::BodyNotReplayable)
        } else if self.policy.idempotent_only() && !request.method().is_idempotent() {
            Some(NonRetryableReason::NonIdempotentMethod)
        } else {
            None
        }
    }

    fn stop_error(&self, state: &RetryState, reason: StopReason, outcome: AttemptOutcome) -> ExecutionError {
        let attempts = state.attempt();
        let elapsed = state.elapsed();
        let cause = outcome.into_cause();
        match reason {
            StopReason::NonRetryable => ExecutionError::NonRetryableRequest {
                reason: NonRetryableReason::Rejected,
                attempts,
                cause,
            },
            StopReason::MaxAttempts => ExecutionError::RetryExhausted {
                attempts,
                elapsed,
                cause,
            },
            StopReason::DeadlineExceeded => ExecutionError::DeadlineExceeded {
                attempts,
                elapsed,
                cause,
            },
        }
    }
}

impl std::fmt::Debug for RetryingExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingExecutor")
            .field("transport", &self.transport.name())
            .field("policy", &self.policy)
            .field("attempt_timeout", &self.attempt_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{TransportError, TransportErrorKind};
    use futures_util::future::{BoxFuture, FutureExt};
    use http::StatusCode;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Answers with the listed statuses in order, repeating the last one.
    struct Statuses {
        script: Vec<u16>,
        calls: AtomicU32,
    }

    impl Statuses {
        fn new(script: &[u16]) -> Arc<Self> {
            Arc::new(Self {
                script: script.to_vec(),
                calls: AtomicU32::new(0),
            })
        }
    }

    impl TransportExecutor for Statuses {
        fn name(&self) -> &str {
            "statuses"
        }

        fn execute<'a>(&'a self, _request: &'a Request) -> BoxFuture<'a, Result<Response, TransportError>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            let code = self.script[call.min(self.script.len() - 1)];
            async move {
                if code == 0 {
                    return Err(TransportError::new(TransportErrorKind::InvalidRequest, "malformed"));
                }
                Ok(Response::with_body(StatusCode::from_u16(code).unwrap(), "body"))
            }
            .boxed()
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::builder()
            .max_attempts(max_attempts)
            .base_delay(Duration::from_millis(10))
            .max_delay(Duration::from_millis(40))
            .jitter(false)
            .build()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let transport = Statuses::new(&[503, 502, 200]);
        let executor = RetryingExecutor::new(transport.clone(), policy(3));
        let pool = WorkerPool::current().unwrap();

        let response = executor
            .execute_async_on(Request::get("http://svc/").build().unwrap(), &pool)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_on_non_retryable_failure() {
        let transport = Statuses::new(&[0]);
        let executor = RetryingExecutor::new(transport.clone(), policy(5));
        let pool = WorkerPool::current().unwrap();

        let err = executor
            .execute_async_on(Request::get("http://svc/").build().unwrap(), &pool)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::NonRetryableRequest {
                reason: NonRetryableReason::Rejected,
                attempts: 1,
                ..
            }
        ));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idempotent_only_blocks_post_retry() {
        let transport = Statuses::new(&[503, 200]);
        let policy = RetryPolicy::builder()
            .idempotent_only(true)
            .jitter(false)
            .build()
            .unwrap();
        let executor = RetryingExecutor::new(transport.clone(), policy);
        let pool = WorkerPool::current().unwrap();

        let request = Request::post("http://svc/").body("payload").build().unwrap();
        let err = executor.execute_async_on(request, &pool).await.unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::NonRetryableRequest {
                reason: NonRetryableReason::NonIdempotentMethod,
                ..
            }
        ));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_carries_last_status() {
        let transport = Statuses::new(&[503]);
        let executor = RetryingExecutor::new(transport.clone(), policy(2));
        let pool = WorkerPool::current().unwrap();

        let err = executor
            .execute_async_on(Request::get("http://svc/").build().unwrap(), &pool)
            .await
            .unwrap_err();
        let status = err.cause().and_then(|c| c.response()).map(|r| r.status());
        assert_eq!(status, Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(err.attempts(), Some(2));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_blocking_inside_runtime_context() {
        let transport = Statuses::new(&[503, 200]);
        let executor = RetryingExecutor::new(transport.clone(), policy(2));
        let response = executor
            .execute_blocking(Request::get("http://svc/").build().unwrap())
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.body().is_buffered());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_from_config_uses_registry() {
        let mut config = ClientConfig::default();
        config.timeouts.attempt_ms = 0;
        let executor = RetryingExecutor::from_config(&config, &TransportRegistry::with_defaults()).unwrap();
        assert_eq!(executor.transport().name(), "hyper");
        assert_eq!(executor.attempt_timeout(), None);
        assert_eq!(executor.policy().max_attempts(), 3);

        config.transport.backend = "carrier-pigeon".to_string();
        let err = RetryingExecutor::from_config(&config, &TransportRegistry::with_defaults()).unwrap_err();
        assert!(matches!(err, BuildError::Transport(RegistryError::Unknown { .. })));
    }
}
