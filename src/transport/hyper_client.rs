//! Transport backed by the `hyper-util` legacy client.
//!
//! # Responsibilities
//! - Translate a [`Request`] into a `hyper` request for one attempt
//! - Map client failures onto [`TransportErrorKind`]s
//! - Hand the response body back as a stream, unread
//!
//! # Design Decisions
//! - Plain `http://` only (`HttpConnector`); TLS targets go through reqwest
//! - Connection pooling and the connect timeout come from config

use bytes::Bytes;
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::TryStreamExt;
use http::header::{HeaderValue, CONTENT_LENGTH, USER_AGENT};
use http::Uri;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::Frame;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};

use crate::config::{TimeoutConfig, TransportConfig};
use crate::http::{Payload, Request, Response, ResponseBody};
use crate::transport::error::{chain_mentions, kind_from_chain};
use crate::transport::{TransportError, TransportErrorKind, TransportExecutor};

type OutboundBody = UnsyncBoxBody<Bytes, std::io::Error>;

/// `hyper` based [`TransportExecutor`].
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<HttpConnector, OutboundBody>,
    user_agent: Option<HeaderValue>,
}

impl HyperTransport {
    pub fn new(transport: &TransportConfig, timeouts: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(timeouts.connect()));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(timeouts.idle())
            .pool_max_idle_per_host(transport.pool_max_idle_per_host)
            .build(connector);

        let user_agent = HeaderValue::from_str(&transport.user_agent).ok();
        if user_agent.is_none() {
            tracing::warn!(user_agent = %transport.user_agent, "Ignoring invalid User-Agent");
        }

        Self { client, user_agent }
    }

    fn build_request(&self, request: &Request) -> Result<http::Request<OutboundBody>, TransportError> {
        if request.url().scheme() != "http" {
            return Err(TransportError::new(
                TransportErrorKind::InvalidRequest,
                format!(
                    "hyper transport only supports http targets, got '{}'",
                    request.url().scheme()
                ),
            ));
        }
        let uri: Uri = request.url().as_str().parse().map_err(|e| {
            TransportError::with_source(TransportErrorKind::InvalidRequest, "URL is not a valid URI", e)
        })?;

        let payload = request.body().open()?;
        let mut headers = request.headers().clone();
        if !headers.contains_key(USER_AGENT) {
            if let Some(user_agent) = &self.user_agent {
                headers.insert(USER_AGENT, user_agent.clone());
            }
        }
        if let Payload::Streaming { length: Some(length), .. } = &payload {
            if !headers.contains_key(CONTENT_LENGTH) {
                headers.insert(CONTENT_LENGTH, HeaderValue::from(*length));
            }
        }

        let mut outbound = http::Request::builder()
            .method(http::Method::from(request.method()))
            .uri(uri)
            .body(outbound_body(payload))
            .map_err(|e| {
                TransportError::with_source(TransportErrorKind::InvalidRequest, "failed to build request", e)
            })?;
        *outbound.headers_mut() = headers;
        Ok(outbound)
    }
}

impl TransportExecutor for HyperTransport {
    fn name(&self) -> &str {
        "hyper"
    }

    fn execute<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, TransportError>> {
        async move {
            let outbound = self.build_request(request)?;
            let response = self.client.request(outbound).await.map_err(map_client_error)?;

            let (parts, body) = response.into_parts();
            let body = body
                .map_err(|e| {
                    TransportError::with_source(TransportErrorKind::Body, "failed to read response body", e)
                })
                .boxed();
            Ok(Response::new(parts.status, parts.headers, ResponseBody::streaming(body)))
        }
        .boxed()
    }
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

fn outbound_body(payload: Payload) -> OutboundBody {
    match payload {
        Payload::Empty => Empty::<Bytes>::new().map_err(|never| match never {}).boxed_unsync(),
        Payload::Full(bytes) => Full::new(bytes).map_err(|never| match never {}).boxed_unsync(),
        Payload::Streaming { stream, .. } => StreamBody::new(stream.map_ok(Frame::data)).boxed_unsync(),
    }
}

fn map_client_error(err: hyper_util::client::legacy::Error) -> TransportError {
    let kind = if err.is_connect() {
        // HttpConnector reports resolver failures as "dns error".
        if chain_mentions(&err, "dns error") {
            TransportErrorKind::Dns
        } else if kind_from_chain(&err) == Some(TransportErrorKind::Timeout) {
            TransportErrorKind::Timeout
        } else {
            TransportErrorKind::Connect
        }
    } else {
        kind_from_chain(&err).unwrap_or(TransportErrorKind::Io)
    };
    TransportError::with_source(kind, "request failed", err)
}
