//! Resilient HTTP request execution.
//!
//! A [`RetryingExecutor`] sends a [`Request`] through a pluggable
//! [`TransportExecutor`], retrying transient failures with exponential
//! backoff, and hands back the final [`Response`] or an [`ExecutionError`].

pub mod config;
pub mod error;
pub mod http;
pub mod observability;
pub mod resilience;
pub mod runtime;
pub mod transport;

pub use crate::config::ClientConfig;
pub use crate::error::{AttemptError, ExecutionError, NonRetryableReason};
pub use crate::http::{Method, Request, RequestBody, Response, ResponseBody};
pub use crate::resilience::{RetryPolicy, RetryingExecutor};
pub use crate::runtime::{ExecutionHandle, WorkerPool};
pub use crate::transport::{TransportError, TransportErrorKind, TransportExecutor, TransportRegistry};
