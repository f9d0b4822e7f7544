// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Bounded worker pool for blocking model calls
//!
//! At most `size` jobs execute at once; further submissions wait for a
//! permit. Jobs run on the runtime's blocking threads so the async
//! acceptor never stalls behind inference.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, error};

/// Default number of concurrent workers
pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker pool is closed")]
    Closed,

    #[error("worker failed: {0}")]
    WorkerFailed(String),
}

#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Create a pool of `size` workers (minimum 1)
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Workers currently idle
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run a blocking job on a worker once one is free
    ///
    /// A panicking job is reported as `WorkerFailed` and its permit is
    /// returned, so the pool keeps its full capacity.
    pub async fn run<F, T>(&self, job: F) -> Result<T, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        debug!(available = self.available(), "worker acquired");

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| {
            error!("Worker job failed: {}", e);
            PoolError::WorkerFailed(e.to_string())
        })
    }

    /// Stop accepting jobs; queued submissions fail with `Closed`
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}
