//! Execution runtime subsystem.
//!
//! # Data Flow
//! ```text
//! execute_async(request)
//!     → pool.rs (shared / caller-supplied / immediate WorkerPool)
//!     → spawn retry loop as a task
//!     → handle.rs (ExecutionHandle: await, cancel, drop = abort)
//!
//! execute_blocking(request)
//!     → WorkerPool::immediate() → spawn → block_on(handle) on the calling thread
//! ```
//!
//! # Design Decisions
//! - Executions are independent tasks; nothing is shared between them but the policy and transport
//! - Cancellation is task abort: no attempt starts after it

pub mod handle;
pub mod pool;

pub use handle::ExecutionHandle;
pub use pool::{PoolKind, WorkerPool};
