//! Transport subsystem.
//!
//! # Data Flow
//! ```text
//! startup:
//!     TransportRegistry (hyper, reqwest, custom factories)
//!     → resolve(config.transport.backend)
//!     → Arc<dyn TransportExecutor> injected into RetryingExecutor
//!
//! per attempt:
//!     RetryingExecutor → TransportExecutor::execute(&Request)
//!     → Ok(Response) | Err(TransportError { kind, .. })
//! ```
//!
//! # Design Decisions
//! - The executor only sees the trait; wire details stay inside transports
//! - Error kinds are coarse so classifiers can inspect them without downcasting
//! - Dropping the returned future abandons the in-flight call

pub mod error;
pub mod hyper_client;
pub mod registry;
pub mod reqwest_client;

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::http::{Request, Response};

pub use error::{TransportError, TransportErrorKind};
pub use hyper_client::HyperTransport;
pub use registry::{RegistryError, TransportFactory, TransportRegistry};
pub use reqwest_client::ReqwestTransport;

/// Executes a single request against the network.
///
/// Implementations must be safe to call from many concurrent executions.
pub trait TransportExecutor: Send + Sync {
    /// Short backend name used in logs and metrics.
    fn name(&self) -> &str;

    /// Send `request` once and return the response head with a streaming body.
    fn execute<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, TransportError>>;
}

impl<T: TransportExecutor + ?Sized> TransportExecutor for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn execute<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, TransportError>> {
        (**self).execute(request)
    }
}
