//! Request and response bodies.
//!
//! # Responsibilities
//! - Model request bodies that can (or cannot) be re-supplied per attempt
//! - Hand transports a fresh [`Payload`] for every attempt
//! - Wrap response bodies so the executor can close discarded ones
//!
//! # Design Decisions
//! - In-memory and factory bodies are replayable; a single-use stream is not
//! - A single-use stream is taken out exactly once, the second `open` fails
//! - Response bodies are either buffered bytes or a boxed streaming body

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use http_body_util::combinators::BoxBody;
use http_body_util::BodyExt;

use crate::transport::{TransportError, TransportErrorKind};

/// Stream of request body chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

type StreamFactory = dyn Fn() -> ByteStream + Send + Sync;

/// Body of an outbound request.
pub struct RequestBody {
    kind: BodyKind,
}

enum BodyKind {
    Empty,
    Bytes(Bytes),
    Factory {
        make: Arc<StreamFactory>,
        length: Option<u64>,
    },
    OneShot {
        stream: Mutex<Option<ByteStream>>,
        length: Option<u64>,
    },
}

/// Body content handed to a transport for one attempt.
pub enum Payload {
    Empty,
    Full(Bytes),
    Streaming {
        stream: ByteStream,
        length: Option<u64>,
    },
}

impl RequestBody {
    /// A request without a body.
    pub fn empty() -> Self {
        Self { kind: BodyKind::Empty }
    }

    /// An in-memory body. Replayable.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            kind: BodyKind::Bytes(bytes.into()),
        }
    }

    /// A body re-created by `make` on every attempt. Replayable.
    pub fn from_factory<F>(length: Option<u64>, make: F) -> Self
    where
        F: Fn() -> ByteStream + Send + Sync + 'static,
    {
        Self {
            kind: BodyKind::Factory {
                make: Arc::new(make),
                length,
            },
        }
    }

    /// A single-use stream. Requests carrying it are never retried.
    pub fn from_stream(stream: ByteStream, length: Option<u64>) -> Self {
        Self {
            kind: BodyKind::OneShot {
                stream: Mutex::new(Some(stream)),
                length,
            },
        }
    }

    /// Whether a fresh copy of the body can be produced for another attempt.
    pub fn is_replayable(&self) -> bool {
        !matches!(self.kind, BodyKind::OneShot { .. })
    }

    pub fn is_empty(&self) -> bool {
        match &self.kind {
            BodyKind::Empty => true,
            BodyKind::Bytes(bytes) => bytes.is_empty(),
            _ => false,
        }
    }

    /// Body length when known up front.
    pub fn content_length(&self) -> Option<u64> {
        match &self.kind {
            BodyKind::Empty => Some(0),
            BodyKind::Bytes(bytes) => Some(bytes.len() as u64),
            BodyKind::Factory { length, .. } | BodyKind::OneShot { length, .. } => *length,
        }
    }

    /// Produce the payload for one attempt.
    ///
    /// Fails with [`TransportErrorKind::BodyConsumed`] when a single-use
    /// stream was already handed out.
    pub fn open(&self) -> Result<Payload, TransportError> {
        match &self.kind {
            BodyKind::Empty => Ok(Payload::Empty),
            BodyKind::Bytes(bytes) => Ok(Payload::Full(bytes.clone())),
            BodyKind::Factory { make, length } => Ok(Payload::Streaming {
                stream: make(),
                length: *length,
            }),
            BodyKind::OneShot { stream, length } => {
                let taken = stream
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                match taken {
                    Some(stream) => Ok(Payload::Streaming {
                        stream,
                        length: *length,
                    }),
                    None => Err(TransportError::new(
                        TransportErrorKind::BodyConsumed,
                        "single-use request body was already consumed",
                    )),
                }
            }
        }
    }
}

impl Default for RequestBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            BodyKind::Empty => f.write_str("RequestBody::Empty"),
            BodyKind::Bytes(bytes) => f
                .debug_struct("RequestBody::Bytes")
                .field("len", &bytes.len())
                .finish(),
            BodyKind::Factory { length, .. } => f
                .debug_struct("RequestBody::Factory")
                .field("length", length)
                .finish(),
            BodyKind::OneShot { length, .. } => f
                .debug_struct("RequestBody::OneShot")
                .field("length", length)
                .finish(),
        }
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        Self::from_bytes(text)
    }
}

impl From<&'static str> for RequestBody {
    fn from(text: &'static str) -> Self {
        Self::from_bytes(text)
    }
}

impl Payload {
    /// Turn the payload into a chunk stream, whatever its shape.
    pub fn into_stream(self) -> ByteStream {
        match self {
            Payload::Empty => futures_util::stream::empty().boxed(),
            Payload::Full(bytes) => futures_util::stream::once(async move { Ok(bytes) }).boxed(),
            Payload::Streaming { stream, .. } => stream,
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Empty => f.write_str("Payload::Empty"),
            Payload::Full(bytes) => write!(f, "Payload::Full({} bytes)", bytes.len()),
            Payload::Streaming { length, .. } => write!(f, "Payload::Streaming({length:?})"),
        }
    }
}

/// Body of an inbound response.
///
/// Owned by whoever holds the [`Response`](crate::http::Response). Dropping
/// or [`close`](ResponseBody::close)-ing a streaming body releases the
/// underlying connection.
pub struct ResponseBody {
    kind: ResponseKind,
}

enum ResponseKind {
    Buffered(Bytes),
    Streaming(BoxBody<Bytes, TransportError>),
    Closed,
}

impl ResponseBody {
    pub fn empty() -> Self {
        Self::from_bytes(Bytes::new())
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            kind: ResponseKind::Buffered(bytes.into()),
        }
    }

    /// Wrap a streaming body produced by a transport.
    pub fn streaming(body: BoxBody<Bytes, TransportError>) -> Self {
        Self {
            kind: ResponseKind::Streaming(body),
        }
    }

    pub fn is_buffered(&self) -> bool {
        matches!(self.kind, ResponseKind::Buffered(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.kind, ResponseKind::Closed)
    }

    /// Buffered content, if the body has been read into memory.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match &self.kind {
            ResponseKind::Buffered(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Exact body length when it is known without reading.
    pub fn exact_length(&self) -> Option<u64> {
        match &self.kind {
            ResponseKind::Buffered(bytes) => Some(bytes.len() as u64),
            ResponseKind::Streaming(body) => hyper::body::Body::size_hint(body).exact(),
            ResponseKind::Closed => None,
        }
    }

    /// Read the remaining body into memory.
    pub async fn bytes(self) -> Result<Bytes, TransportError> {
        match self.kind {
            ResponseKind::Buffered(bytes) => Ok(bytes),
            ResponseKind::Streaming(body) => Ok(body.collect().await?.to_bytes()),
            ResponseKind::Closed => Err(TransportError::new(
                TransportErrorKind::Body,
                "response body was already closed",
            )),
        }
    }

    /// Read the body into memory, keeping it as a `ResponseBody`.
    pub async fn buffer(self) -> Result<Self, TransportError> {
        self.bytes().await.map(Self::from_bytes)
    }

    /// Release the body. Returns `true` if a stream was still open.
    pub fn close(&mut self) -> bool {
        let was_open = matches!(self.kind, ResponseKind::Streaming(_));
        self.kind = ResponseKind::Closed;
        was_open
    }
}

impl Default for ResponseBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ResponseKind::Buffered(bytes) => write!(f, "ResponseBody::Buffered({} bytes)", bytes.len()),
            ResponseKind::Streaming(_) => f.write_str("ResponseBody::Streaming"),
            ResponseKind::Closed => f.write_str("ResponseBody::Closed"),
        }
    }
}
