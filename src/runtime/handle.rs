//! Handle to an execution running on a worker pool.

use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use tokio::task::JoinHandle;

use crate::error::ExecutionError;
use crate::http::Response;
use crate::resilience::ExecutionId;

/// Future resolving to the result of one execution.
///
/// Dropping the handle or calling [`ExecutionHandle::cancel`] aborts the
/// execution; no further attempts are made and the handle resolves to
/// [`ExecutionError::Cancelled`].
#[must_use = "dropping an ExecutionHandle cancels the execution"]
pub struct ExecutionHandle {
    id: ExecutionId,
    state: State,
}

enum State {
    Running(JoinHandle<Result<Response, ExecutionError>>),
    Failed(Option<ExecutionError>),
}

impl ExecutionHandle {
    pub(crate) fn spawned(id: ExecutionId, join: JoinHandle<Result<Response, ExecutionError>>) -> Self {
        Self {
            id,
            state: State::Running(join),
        }
    }

    /// A handle for an execution that could not be started.
    pub(crate) fn failed(id: ExecutionId, err: ExecutionError) -> Self {
        Self {
            id,
            state: State::Failed(Some(err)),
        }
    }

    pub fn id(&self) -> ExecutionId {
        self.id
    }

    /// Request cancellation. Awaiting the handle afterwards yields
    /// [`ExecutionError::Cancelled`] unless the execution already finished.
    pub fn cancel(&self) {
        if let State::Running(join) = &self.state {
            if !join.is_finished() {
                tracing::debug!(execution_id = %self.id, "Cancelling execution");
                join.abort();
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        match &self.state {
            State::Running(join) => join.is_finished(),
            State::Failed(_) => true,
        }
    }
}

impl Future for ExecutionHandle {
    type Output = Result<Response, ExecutionError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.state {
            State::Running(join) => match ready!(Pin::new(join).poll(cx)) {
                Ok(result) => Poll::Ready(result),
                Err(err) if err.is_cancelled() => {
                    crate::observability::metrics::record_execution_cancelled();
                    Poll::Ready(Err(ExecutionError::Cancelled))
                }
                Err(err) => std::panic::resume_unwind(err.into_panic()),
            },
            State::Failed(err) => Poll::Ready(Err(err.take().unwrap_or(ExecutionError::Cancelled))),
        }
    }
}

impl Drop for ExecutionHandle {
    fn drop(&mut self) {
        if let State::Running(join) = &self.state {
            if !join.is_finished() {
                crate::observability::metrics::record_execution_cancelled();
            }
            join.abort();
        }
    }
}

impl std::fmt::Debug for ExecutionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionHandle")
            .field("id", &self.id)
            .field("finished", &self.is_finished())
            .finish()
    }
}
