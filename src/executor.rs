use crate::error::{ConfigError, Error};
use crate::params::parallel_threshold;
use std::ops::Range;
use std::sync::Arc;

pub trait ParallelExecutor: Send + Sync {
    fn workers(&self) -> usize;

    /// Runs `task` over disjoint ranges covering `0..len` and blocks until all
    /// of them finish.
    fn run_partitioned(&self, len: usize, task: &(dyn Fn(Range<usize>) + Sync));
}

pub fn partition(len: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.clamp(1, len.max(1));
    let base = len / parts;
    let extra = len % parts;
    let mut start = 0;
    (0..parts)
        .map(|i| {
            let size = base + usize::from(i < extra);
            let range = start..start + size;
            start += size;
            range
        })
        .filter(|range| !range.is_empty())
        .collect()
}

pub struct WorkerPool {
    pool: rayon::ThreadPool,
    threads: usize,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Result<Self, Error> {
        if threads == 0 {
            return Err(ConfigError::Workers.into());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("particle-worker-{i}"))
            .build()?;
        log::info!("worker pool started with {threads} threads");
        Ok(Self { pool, threads })
    }

    pub fn shutdown(self) {
        log::info!("worker pool shutting down ({} threads)", self.threads);
        drop(self.pool);
    }
}

impl ParallelExecutor for WorkerPool {
    fn workers(&self) -> usize {
        self.threads
    }

    fn run_partitioned(&self, len: usize, task: &(dyn Fn(Range<usize>) + Sync)) {
        if len == 0 {
            return;
        }
        if self.threads == 1 || len < parallel_threshold() {
            task(0..len);
            return;
        }
        self.pool.scope(|scope| {
            for range in partition(len, self.threads) {
                scope.spawn(move |_| task(range));
            }
        });
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads)
            .finish()
    }
}

impl<E: ParallelExecutor + ?Sized> ParallelExecutor for Arc<E> {
    fn workers(&self) -> usize {
        (**self).workers()
    }

    fn run_partitioned(&self, len: usize, task: &(dyn Fn(Range<usize>) + Sync)) {
        (**self).run_partitioned(len, task)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct InlineExecutor;

impl ParallelExecutor for InlineExecutor {
    fn workers(&self) -> usize {
        1
    }

    fn run_partitioned(&self, len: usize, task: &(dyn Fn(Range<usize>) + Sync)) {
        if len > 0 {
            task(0..len);
        }
    }
}
