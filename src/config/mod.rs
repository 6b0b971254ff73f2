//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ClientConfig (validated, immutable)
//!     → RetryPolicy / TransportRegistry / WorkerPool built from it once
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the executor never re-reads it
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::ClientConfig;
pub use schema::LogFormat;
pub use schema::ObservabilityConfig;
pub use schema::RetryConfig;
pub use schema::TimeoutConfig;
pub use schema::TransportConfig;
pub use schema::WorkerPoolConfig;
pub use validation::{validate_config, ValidationError};
