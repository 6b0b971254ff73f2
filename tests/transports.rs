//! Built-in transports driven by the executor against a local HTTP backend.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use http::StatusCode;

use resilient_http::config::ClientConfig;
use resilient_http::transport::TransportErrorKind;
use resilient_http::{ExecutionError, Request, RetryingExecutor, TransportRegistry, WorkerPool};

mod common;

fn config_for(backend: &str, max_attempts: u32) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.transport.backend = backend.to_string();
    config.retries.max_attempts = max_attempts;
    config.retries.base_delay_ms = 20;
    config.retries.max_delay_ms = 100;
    config.retries.jitter = false;
    config
}

async fn recovers_after_unavailable(backend: &str) {
    let call_count = Arc::new(AtomicU32::new(0));
    let cc = call_count.clone();
    let addr = common::start_programmable_backend(move |_request| {
        let cc = cc.clone();
        async move {
            let count = cc.fetch_add(1, Ordering::SeqCst);
            if count < 2 {
                (503, "Service Unavailable".into())
            } else {
                (200, "Success".into())
            }
        }
    })
    .await;

    let executor =
        RetryingExecutor::from_config(&config_for(backend, 3), &TransportRegistry::with_defaults()).unwrap();
    let pool = WorkerPool::current().unwrap();

    let request = Request::get(&format!("http://{addr}/")).build().unwrap();
    let response = executor.execute_async_on(request, &pool).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.content_length(), Some(7));
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"Success");
    assert_eq!(call_count.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_hyper_retries_unavailable_backend() {
    recovers_after_unavailable("hyper").await;
}

#[tokio::test]
async fn test_reqwest_retries_unavailable_backend() {
    recovers_after_unavailable("reqwest").await;
}

async fn resends_body(backend: &str) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let addr = common::start_programmable_backend(move |request| {
        let sink = sink.clone();
        async move {
            let mut seen = sink.lock().unwrap();
            seen.push(request.clone());
            if seen.len() == 1 {
                (502, String::new())
            } else {
                (201, String::from_utf8_lossy(&request.body).to_string())
            }
        }
    })
    .await;

    let executor =
        RetryingExecutor::from_config(&config_for(backend, 2), &TransportRegistry::with_defaults()).unwrap();
    let pool = WorkerPool::current().unwrap();

    let request = Request::post(&format!("http://{addr}/orders"))
        .header("content-type", "application/json")
        .body(r#"{"id":7}"#)
        .build()
        .unwrap();
    let response = executor.execute_async_on(request, &pool).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.bytes().await.unwrap().as_ref(), br#"{"id":7}"#);

    let seen = received.lock().unwrap();
    assert_eq!(seen.len(), 2);
    for request in seen.iter() {
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/orders");
        assert_eq!(request.body, br#"{"id":7}"#);
    }
}

#[tokio::test]
async fn test_hyper_resends_body() {
    resends_body("hyper").await;
}

#[tokio::test]
async fn test_reqwest_resends_body() {
    resends_body("reqwest").await;
}

#[tokio::test]
async fn test_refused_connection_exhausts_retries() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    for backend in ["hyper", "reqwest"] {
        let executor =
            RetryingExecutor::from_config(&config_for(backend, 2), &TransportRegistry::with_defaults())
                .unwrap();
        let pool = WorkerPool::current().unwrap();

        let request = Request::get(&format!("http://{addr}/")).build().unwrap();
        let err = executor.execute_async_on(request, &pool).await.unwrap_err();

        match &err {
            ExecutionError::RetryExhausted { attempts: 2, cause, .. } => {
                let kind = cause.transport_error().map(|e| e.kind());
                assert_eq!(kind, Some(TransportErrorKind::Connect), "{backend}");
            }
            other => panic!("{backend}: unexpected error {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_slow_backend_hits_attempt_timeout() {
    let call_count = Arc::new(AtomicU32::new(0));
    let cc = call_count.clone();
    let addr = common::start_programmable_backend(move |_request| {
        let cc = cc.clone();
        async move {
            if cc.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
            (200, "fast".into())
        }
    })
    .await;

    let mut config = config_for("hyper", 3);
    config.timeouts.attempt_ms = 200;
    let executor = RetryingExecutor::from_config(&config, &TransportRegistry::with_defaults()).unwrap();
    let pool = WorkerPool::current().unwrap();

    let request = Request::get(&format!("http://{addr}/")).build().unwrap();
    let response = executor.execute_async_on(request, &pool).await.unwrap();

    assert_eq!(response.bytes().await.unwrap().as_ref(), b"fast");
    assert_eq!(call_count.load(Ordering::SeqCst), 2);
}

#[test]
fn test_blocking_execution_against_backend() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let addr = runtime.block_on(common::start_programmable_backend(|request| async move {
        (200, format!("{} {}", request.method, request.path))
    }));

    let executor =
        RetryingExecutor::from_config(&config_for("hyper", 1), &TransportRegistry::with_defaults()).unwrap();
    let request = Request::get(&format!("http://{addr}/blocking")).build().unwrap();
    let response = executor.execute_blocking(request).unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body().as_bytes().unwrap().as_ref(), b"GET /blocking");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_execution_from_spawn_blocking() {
    let addr = common::start_programmable_backend(|request| async move {
        (200, format!("{} {}", request.method, request.path))
    })
    .await;

    for backend in ["hyper", "reqwest"] {
        let executor =
            RetryingExecutor::from_config(&config_for(backend, 1), &TransportRegistry::with_defaults())
                .unwrap();
        let url = format!("http://{addr}/offloaded");

        let response = tokio::task::spawn_blocking(move || {
            let request = Request::get(&url).build().unwrap();
            executor.execute_blocking(request)
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(response.status(), StatusCode::OK, "{backend}");
        assert_eq!(response.body().as_bytes().unwrap().as_ref(), b"GET /offloaded");
    }
}
