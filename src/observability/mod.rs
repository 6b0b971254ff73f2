//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every execution produces:
//!     → an `execution` span (execution_id, method, url, transport)
//!     → logging.rs (structured events: retries at info, failures at warn)
//!     → metrics.rs (attempt/retry/execution counters, latency histogram)
//! ```
//!
//! # Design Decisions
//! - The library only emits; installing subscribers and recorders is the application's call
//! - Execution IDs flow through all events via the span

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
