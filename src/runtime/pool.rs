//! Worker pools that executions run on.
//!
//! # Responsibilities
//! - Provide the process-wide shared pool (lazily built, bounded parallelism)
//! - Wrap caller-supplied runtimes and handles
//! - Build the single-threaded "immediate" pool used for blocking execution
//!
//! # Design Decisions
//! - A pool is a cheap handle; cloning never starts new threads
//! - Owned runtimes shut down in the background on drop, so dropping a
//!   pool from async code never panics

use std::fmt;
use std::future::Future;
use std::io;
use std::sync::{Arc, OnceLock};

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

use crate::config::WorkerPoolConfig;

static SHARED: OnceLock<WorkerPool> = OnceLock::new();

/// Where a pool's runtime came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    /// Multi-threaded runtime owned by the pool.
    Owned,
    /// Handle to a runtime owned elsewhere.
    Borrowed,
    /// Current-thread runtime driven by the calling thread.
    Immediate,
}

/// An executor that executions are spawned on.
#[derive(Clone)]
pub struct WorkerPool {
    handle: Handle,
    kind: PoolKind,
    owned: Option<Arc<OwnedRuntime>>,
}

struct OwnedRuntime {
    runtime: Option<Runtime>,
}

impl Drop for OwnedRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl WorkerPool {
    /// Start a multi-threaded pool.
    pub fn new(config: &WorkerPoolConfig) -> io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads.max(1))
            .thread_name(config.thread_name.clone())
            .enable_all()
            .build()?;

        tracing::debug!(
            worker_threads = config.worker_threads,
            thread_name = %config.thread_name,
            "Worker pool started"
        );
        Ok(Self::owning(runtime, PoolKind::Owned))
    }

    /// The process-wide default pool, started on first use.
    pub fn shared() -> io::Result<&'static WorkerPool> {
        if let Some(pool) = SHARED.get() {
            return Ok(pool);
        }
        let pool = WorkerPool::new(&WorkerPoolConfig::default())?;
        Ok(SHARED.get_or_init(|| pool))
    }

    /// Start the shared pool with `config`.
    ///
    /// Returns `false` when the shared pool was already running.
    pub fn configure_shared(config: &WorkerPoolConfig) -> io::Result<bool> {
        if SHARED.get().is_some() {
            return Ok(false);
        }
        let pool = WorkerPool::new(config)?;
        Ok(SHARED.set(pool).is_ok())
    }

    /// The runtime the caller is currently running on, if any.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::from_handle)
    }

    /// Wrap a handle to a runtime owned by the caller.
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            handle,
            kind: PoolKind::Borrowed,
            owned: None,
        }
    }

    /// A current-thread pool that only makes progress inside [`WorkerPool::block_on`].
    pub fn immediate() -> io::Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self::owning(runtime, PoolKind::Immediate))
    }

    fn owning(runtime: Runtime, kind: PoolKind) -> Self {
        Self {
            handle: runtime.handle().clone(),
            kind,
            owned: Some(Arc::new(OwnedRuntime {
                runtime: Some(runtime),
            })),
        }
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }

    /// Drive `future` to completion on the calling thread.
    ///
    /// Must not be called from within an async runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        match self.owned.as_ref().and_then(|owned| owned.runtime.as_ref()) {
            Some(runtime) => runtime.block_on(future),
            None => self.handle.block_on(future),
        }
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("kind", &self.kind)
            .field("runtime_flavor", &self.handle.runtime_flavor())
            .finish()
    }
}
