//! Transport error type.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Coarse classification of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// TCP connect refused, reset or unreachable.
    Connect,
    /// Host name resolution failed.
    Dns,
    /// TLS handshake or certificate failure.
    Tls,
    /// The transport's own I/O timeout fired.
    Timeout,
    /// Other I/O failure while sending or receiving.
    Io,
    /// The request cannot be expressed on the wire.
    InvalidRequest,
    /// A single-use request body was already consumed.
    BodyConsumed,
    /// Reading the response body failed.
    Body,
    Other,
}

impl TransportErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Dns => "dns",
            TransportErrorKind::Tls => "tls",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Io => "io",
            TransportErrorKind::InvalidRequest => "invalid_request",
            TransportErrorKind::BodyConsumed => "body_consumed",
            TransportErrorKind::Body => "body",
            TransportErrorKind::Other => "other",
        }
    }

    /// Failures that usually clear up on their own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportErrorKind::Connect
                | TransportErrorKind::Dns
                | TransportErrorKind::Timeout
                | TransportErrorKind::Io
        )
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure reported by a [`TransportExecutor`](crate::transport::TransportExecutor).
#[derive(Debug, Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        kind: TransportErrorKind,
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Best-effort kind for an error chain, looking at `io::Error`s it contains.
pub(crate) fn kind_from_chain(err: &(dyn StdError + 'static)) -> Option<TransportErrorKind> {
    let mut current = Some(err);
    while let Some(err) = current {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            return Some(match io.kind() {
                std::io::ErrorKind::TimedOut => TransportErrorKind::Timeout,
                std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::NotConnected
                | std::io::ErrorKind::AddrNotAvailable => TransportErrorKind::Connect,
                _ => TransportErrorKind::Io,
            });
        }
        current = err.source();
    }
    None
}

/// Whether any error in the chain renders a message containing `needle`.
pub(crate) fn chain_mentions(err: &(dyn StdError + 'static), needle: &str) -> bool {
    let mut current = Some(err);
    while let Some(err) = current {
        if err.to_string().contains(needle) {
            return true;
        }
        current = err.source();
    }
    false
}
