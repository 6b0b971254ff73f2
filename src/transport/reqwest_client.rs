//! Transport backed by `reqwest`.
//!
//! # Responsibilities
//! - Send requests over HTTP or HTTPS (rustls)
//! - Stream request bodies through `reqwest::Body::wrap_stream`
//! - Map `reqwest::Error` predicates onto [`TransportErrorKind`]s

use futures_util::future::{BoxFuture, FutureExt};
use http::header::{HeaderValue, CONTENT_LENGTH};
use http_body_util::BodyExt;

use crate::config::{TimeoutConfig, TransportConfig};
use crate::http::{Payload, Request, Response, ResponseBody};
use crate::transport::error::{chain_mentions, kind_from_chain};
use crate::transport::{TransportError, TransportErrorKind, TransportExecutor};

/// `reqwest` based [`TransportExecutor`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(transport: &TransportConfig, timeouts: &TimeoutConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeouts.connect())
            .pool_idle_timeout(timeouts.idle())
            .pool_max_idle_per_host(transport.pool_max_idle_per_host)
            .user_agent(transport.user_agent.as_str())
            .build()
            .map_err(|e| TransportError::with_source(TransportErrorKind::Other, "failed to build reqwest client", e))?;
        Ok(Self { client })
    }

    /// Wrap an already configured client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl TransportExecutor for ReqwestTransport {
    fn name(&self) -> &str {
        "reqwest"
    }

    fn execute<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, TransportError>> {
        async move {
            let payload = request.body().open()?;
            let mut builder = self
                .client
                .request(request.method().into(), request.url().clone())
                .headers(request.headers().clone());

            builder = match payload {
                Payload::Empty => builder,
                Payload::Full(bytes) => builder.body(bytes),
                Payload::Streaming { stream, length } => {
                    if let Some(length) = length {
                        if !request.headers().contains_key(CONTENT_LENGTH) {
                            builder = builder.header(CONTENT_LENGTH, HeaderValue::from(length));
                        }
                    }
                    builder.body(reqwest::Body::wrap_stream(stream))
                }
            };

            let response = builder.send().await.map_err(map_reqwest_error)?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = reqwest::Body::from(response)
                .map_err(|e| {
                    TransportError::with_source(TransportErrorKind::Body, "failed to read response body", e)
                })
                .boxed();
            Ok(Response::new(status, headers, ResponseBody::streaming(body)))
        }
        .boxed()
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    let kind = if err.is_builder() {
        TransportErrorKind::InvalidRequest
    } else if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if err.is_connect() {
        if chain_mentions(&err, "dns error") {
            TransportErrorKind::Dns
        } else if chain_mentions(&err, "certificate") || chain_mentions(&err, "tls") {
            TransportErrorKind::Tls
        } else {
            TransportErrorKind::Connect
        }
    } else if err.is_body() || err.is_decode() {
        TransportErrorKind::Body
    } else {
        kind_from_chain(&err).unwrap_or(TransportErrorKind::Io)
    };
    TransportError::with_source(kind, "request failed", err)
}
