//! Inbound response model.
//!
//! # Responsibilities
//! - Carry status, headers and body of a completed attempt
//! - Expose content length (`None` when unknown or chunked)
//! - Parse `Retry-After` hints for the retry policy

use std::fmt;
use std::time::Duration;

use http::header::{HeaderMap, CONTENT_LENGTH, RETRY_AFTER};
use http::StatusCode;

use crate::http::body::ResponseBody;
use crate::transport::TransportError;

/// A response produced by a transport.
///
/// The holder owns the body and is expected to read or close it.
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseBody,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: ResponseBody) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Response with a buffered body and no headers.
    pub fn with_body(status: StatusCode, body: impl Into<bytes::Bytes>) -> Self {
        Self::new(status, HeaderMap::new(), ResponseBody::from_bytes(body))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    pub fn into_parts(self) -> (StatusCode, HeaderMap, ResponseBody) {
        (self.status, self.headers, self.body)
    }

    /// Declared or exact content length; `None` when unknown.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
            .or_else(|| self.body.exact_length())
    }

    /// `Retry-After` expressed in delta-seconds. HTTP-date values are ignored.
    pub fn retry_after(&self) -> Option<Duration> {
        self.headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// Read the whole body into memory.
    pub async fn bytes(self) -> Result<bytes::Bytes, TransportError> {
        self.body.bytes().await
    }

    /// Read the body into memory but keep the response.
    pub async fn into_buffered(self) -> Result<Self, TransportError> {
        let body = self.body.buffer().await?;
        Ok(Self { body, ..self })
    }

    /// Release the body without reading it.
    pub fn close(mut self) {
        if self.body.close() {
            tracing::trace!(status = %self.status, "Closed unread response body");
        }
    }

    /// Close the body but keep status and headers.
    pub fn without_body(mut self) -> Self {
        if self.body.close() {
            tracing::trace!(status = %self.status, "Closed unread response body");
        }
        self
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .finish()
    }
}
