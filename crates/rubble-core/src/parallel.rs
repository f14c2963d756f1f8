//! Chunked fork/join over disjoint work items

use crate::error::{Result, RubbleError};
use rayon::prelude::*;

/// Dedicated worker pool for per-frame simulation jobs.
///
/// Callers split their data into disjoint chunks (each chunk owning its
/// mutable slices) and hand them to [`WorkerPool::run_chunks`], which returns
/// only once every chunk has been processed. That return is the frame's join
/// fence: no dependent stage can observe a partially updated tick.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    /// Build a pool with `threads` workers; `0` picks one per logical core.
    pub fn new(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("rubble-worker-{i}"))
            .build()
            .map_err(|e| RubbleError::InvalidConfig(format!("worker pool: {e}")))?;
        log::info!(
            "[workers] started {} simulation worker(s)",
            pool.current_num_threads()
        );
        Ok(Self { pool })
    }

    /// Number of worker threads
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `job` once per chunk in parallel and block until all have finished.
    pub fn run_chunks<T, F>(&self, chunks: Vec<T>, job: F)
    where
        T: Send,
        F: Fn(T) + Sync + Send,
    {
        if chunks.is_empty() {
            return;
        }
        self.pool.install(|| chunks.into_par_iter().for_each(job));
    }
}
