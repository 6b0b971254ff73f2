//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::{stream, StreamExt, TryStreamExt};
use http::StatusCode;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use resilient_http::http::{Payload, ResponseBody};
use resilient_http::{Request, Response, RetryPolicy, TransportError, TransportErrorKind, TransportExecutor};

/// One scripted reaction of [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub enum Step {
    Respond(u16, &'static str),
    Fail(TransportErrorKind),
    /// Never answers.
    Hang,
}

/// In-process transport that replays a script, repeating its last step.
pub struct ScriptedTransport {
    script: Vec<Step>,
    calls: AtomicUsize,
    released_bodies: Arc<AtomicUsize>,
    bodies: Mutex<Vec<Bytes>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Step>) -> Arc<Self> {
        assert!(!script.is_empty());
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
            released_bodies: Arc::new(AtomicUsize::new(0)),
            bodies: Mutex::new(Vec::new()),
        })
    }

    pub fn statuses(codes: &[u16]) -> Arc<Self> {
        Self::new(codes.iter().map(|&code| Step::Respond(code, "body")).collect())
    }

    /// Number of transport invocations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of response bodies dropped, read or not.
    pub fn released_bodies(&self) -> usize {
        self.released_bodies.load(Ordering::SeqCst)
    }

    /// Request bodies received, one per attempt.
    pub fn bodies(&self) -> Vec<Bytes> {
        self.bodies.lock().unwrap().clone()
    }
}

struct ReleaseGuard(Arc<AtomicUsize>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn tracked_body(content: &'static str, released: Arc<AtomicUsize>) -> ResponseBody {
    let guard = ReleaseGuard(released);
    let frames = stream::iter(vec![Ok::<_, TransportError>(Frame::data(Bytes::from_static(
        content.as_bytes(),
    )))])
    .map(move |frame| {
        let _held = &guard;
        frame
    });
    ResponseBody::streaming(BodyExt::boxed(StreamBody::new(frames)))
}

impl TransportExecutor for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    fn execute<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, TransportError>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.script[call.min(self.script.len() - 1)].clone();
        async move {
            let received = match request.body().open()? {
                Payload::Empty => Bytes::new(),
                Payload::Full(bytes) => bytes,
                Payload::Streaming { stream, .. } => {
                    let chunks: Vec<Bytes> = stream
                        .try_collect()
                        .await
                        .map_err(|e| TransportError::new(TransportErrorKind::Io, e.to_string()))?;
                    Bytes::from(chunks.concat())
                }
            };
            self.bodies.lock().unwrap().push(received);

            match step {
                Step::Respond(code, content) => Ok(Response::new(
                    StatusCode::from_u16(code).unwrap(),
                    http::HeaderMap::new(),
                    tracked_body(content, self.released_bodies.clone()),
                )),
                Step::Fail(kind) => Err(TransportError::new(kind, "scripted failure")),
                Step::Hang => futures_util::future::pending().await,
            }
        }
        .boxed()
    }
}

/// Policy without jitter so delays are predictable.
pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::builder()
        .max_attempts(max_attempts)
        .base_delay(Duration::from_millis(20))
        .max_delay(Duration::from_millis(200))
        .jitter(false)
        .build()
        .unwrap()
}

/// Request received by the programmable backend.
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
}

/// Start a programmable HTTP/1.1 backend on an ephemeral port.
///
/// Each connection serves one request and is closed.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(ReceivedRequest) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        let (status, body) = f(request).await;
                        let reason = StatusCode::from_u16(status)
                            .ok()
                            .and_then(|s| s.canonical_reason())
                            .unwrap_or("Unknown");

                        let response_str = format!(
                            "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status,
                            reason,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<ReceivedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < head_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let body_end = buf.len().min(head_end + content_length);
    Some(ReceivedRequest {
        method,
        path,
        body: buf[head_end..body_end].to_vec(),
    })
}
