//! `tower::Service` adapter for [`RetryingExecutor`].

use std::task::{Context, Poll};

use crate::error::ExecutionError;
use crate::http::{Request, Response};
use crate::resilience::executor::RetryingExecutor;
use crate::runtime::{ExecutionHandle, WorkerPool};

impl tower::Service<Request> for RetryingExecutor {
    type Response = Response;
    type Error = ExecutionError;
    type Future = ExecutionHandle;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    /// Runs on the caller's runtime when there is one, else on the shared pool.
    fn call(&mut self, request: Request) -> Self::Future {
        match WorkerPool::current() {
            Some(pool) => self.execute_async_on(request, &pool),
            None => self.execute_async(request),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::http::{Request, Response};
    use crate::resilience::{RetryPolicy, RetryingExecutor};
    use crate::transport::{TransportError, TransportExecutor};
    use futures_util::future::{BoxFuture, FutureExt};
    use http::StatusCode;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct Echo;

    impl TransportExecutor for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn execute<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, TransportError>> {
            let path = request.url().path().to_string();
            async move { Ok(Response::with_body(StatusCode::OK, path)) }.boxed()
        }
    }

    #[tokio::test]
    async fn test_oneshot_through_service() {
        let executor = RetryingExecutor::new(Arc::new(Echo), RetryPolicy::no_retry());
        let response = executor
            .oneshot(Request::get("http://svc/echo").build().unwrap())
            .await
            .unwrap();
        assert_eq!(response.bytes().await.unwrap().as_ref(), b"/echo");
    }
}
