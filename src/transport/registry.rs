//! Transport selection at startup.
//!
//! # Responsibilities
//! - Hold named [`TransportFactory`]s (built-in and custom)
//! - Resolve the configured backend once and hand back a shared executor
//!
//! # Design Decisions
//! - Resolution happens once; the retrying executor receives the result
//! - Registering a factory under an existing name replaces it

use std::sync::Arc;

use thiserror::Error;

use crate::config::ClientConfig;
use crate::transport::{HyperTransport, ReqwestTransport, TransportError, TransportExecutor};

/// Builds one kind of [`TransportExecutor`] from configuration.
pub trait TransportFactory: Send + Sync {
    fn name(&self) -> &'static str;

    fn create(&self, config: &ClientConfig) -> Result<Arc<dyn TransportExecutor>, TransportError>;
}

/// Errors raised while resolving a transport.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no transport registered under '{requested}' (available: {})", .available.join(", "))]
    Unknown {
        requested: String,
        available: Vec<&'static str>,
    },

    #[error("failed to create transport '{name}'")]
    Create {
        name: &'static str,
        #[source]
        source: TransportError,
    },
}

/// Named collection of transport factories.
#[derive(Default)]
pub struct TransportRegistry {
    factories: Vec<Arc<dyn TransportFactory>>,
}

impl TransportRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `hyper` and `reqwest` transports.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(HyperFactory);
        registry.register(ReqwestFactory);
        registry
    }

    pub fn register<F: TransportFactory + 'static>(&mut self, factory: F) -> &mut Self {
        self.factories.retain(|f| f.name() != factory.name());
        self.factories.push(Arc::new(factory));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.factories.iter().map(|f| f.name()).collect()
    }

    /// Build the transport named by `config.transport.backend`.
    pub fn resolve(&self, config: &ClientConfig) -> Result<Arc<dyn TransportExecutor>, RegistryError> {
        let requested = config.transport.backend.trim();
        let factory = self
            .factories
            .iter()
            .find(|f| f.name().eq_ignore_ascii_case(requested))
            .ok_or_else(|| RegistryError::Unknown {
                requested: requested.to_string(),
                available: self.names(),
            })?;

        let transport = factory
            .create(config)
            .map_err(|source| RegistryError::Create {
                name: factory.name(),
                source,
            })?;

        tracing::info!(backend = factory.name(), "Transport resolved");
        Ok(transport)
    }
}

impl std::fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportRegistry")
            .field("factories", &self.names())
            .finish()
    }
}

struct HyperFactory;

impl TransportFactory for HyperFactory {
    fn name(&self) -> &'static str {
        "hyper"
    }

    fn create(&self, config: &ClientConfig) -> Result<Arc<dyn TransportExecutor>, TransportError> {
        Ok(Arc::new(HyperTransport::new(&config.transport, &config.timeouts)))
    }
}

struct ReqwestFactory;

impl TransportFactory for ReqwestFactory {
    fn name(&self) -> &'static str {
        "reqwest"
    }

    fn create(&self, config: &ClientConfig) -> Result<Arc<dyn TransportExecutor>, TransportError> {
        Ok(Arc::new(ReqwestTransport::new(&config.transport, &config.timeouts)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Request, Response};
    use crate::transport::TransportErrorKind;
    use futures_util::future::{BoxFuture, FutureExt};

    struct Canned;

    impl TransportExecutor for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        fn execute<'a>(&'a self, _request: &'a Request) -> BoxFuture<'a, Result<Response, TransportError>> {
            async { Ok(Response::with_body(http::StatusCode::OK, "canned")) }.boxed()
        }
    }

    struct CannedFactory;

    impl TransportFactory for CannedFactory {
        fn name(&self) -> &'static str {
            "canned"
        }

        fn create(&self, _config: &ClientConfig) -> Result<Arc<dyn TransportExecutor>, TransportError> {
            Ok(Arc::new(Canned))
        }
    }

    struct FailingFactory;

    impl TransportFactory for FailingFactory {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn create(&self, _config: &ClientConfig) -> Result<Arc<dyn TransportExecutor>, TransportError> {
            Err(TransportError::new(TransportErrorKind::Other, "boom"))
        }
    }

    fn config_for(backend: &str) -> ClientConfig {
        let mut config = ClientConfig::default();
        config.transport.backend = backend.to_string();
        config
    }

    #[tokio::test]
    async fn test_resolves_defaults_by_name() {
        let registry = TransportRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["hyper", "reqwest"]);

        assert_eq!(registry.resolve(&config_for("hyper")).unwrap().name(), "hyper");
        assert_eq!(registry.resolve(&config_for("REQWEST")).unwrap().name(), "reqwest");
    }

    #[test]
    fn test_unknown_backend_lists_available() {
        let registry = TransportRegistry::with_defaults();
        let err = registry.resolve(&config_for("curl")).err().unwrap();
        assert_eq!(
            err.to_string(),
            "no transport registered under 'curl' (available: hyper, reqwest)"
        );
    }

    #[test]
    fn test_custom_factory_replaces_same_name() {
        let mut registry = TransportRegistry::new();
        registry.register(CannedFactory).register(CannedFactory);
        assert_eq!(registry.names(), vec!["canned"]);
        assert_eq!(registry.resolve(&config_for("canned")).unwrap().name(), "canned");
    }

    #[test]
    fn test_factory_failure_is_wrapped() {
        let mut registry = TransportRegistry::new();
        registry.register(FailingFactory);
        let err = registry.resolve(&config_for("failing")).err().unwrap();
        assert!(matches!(err, RegistryError::Create { name: "failing", .. }));
    }
}
