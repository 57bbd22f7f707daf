//! Bounded worker pool shared by every phase of a run.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

/// Returns `min(available parallelism, cap)`, never less than one.
#[must_use]
pub fn worker_count(cap: usize) -> usize {
    let available = std::thread::available_parallelism().map_or(1, |n| n.get());
    available.min(cap).max(1)
}

/// A fixed-size thread pool created once per run.
pub struct WorkerPool {
    pool: ThreadPool,
    threads: usize,
}

impl WorkerPool {
    /// Builds a pool with [`worker_count`]`(max_workers)` threads.
    ///
    /// # Errors
    ///
    /// Fails if the operating system refuses to spawn the threads.
    pub fn new(max_workers: usize) -> Result<Self, ThreadPoolBuildError> {
        let threads = worker_count(max_workers);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("geodelta-worker-{}", i))
            .build()?;
        Ok(Self { pool, threads })
    }

    /// Number of worker threads.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Applies `f` to every item on the pool and returns the results in
    /// input order, whatever order the workers finish in.
    pub fn map_ordered<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        self.pool.install(|| items.par_iter().map(f).collect())
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn worker_count_is_capped() {
        assert_eq!(worker_count(1), 1);
        assert!(worker_count(4) <= 4);
        assert!(worker_count(4) >= 1);
        assert_eq!(worker_count(0), 1);
    }

    #[test]
    fn results_keep_input_order() {
        let pool = WorkerPool::new(4).unwrap();
        let items: Vec<u64> = (0..32).collect();
        let out = pool.map_ordered(&items, |&i| {
            // Later items finish first
            std::thread::sleep(Duration::from_millis(32 - i));
            i * 10
        });
        assert_eq!(out, items.iter().map(|i| i * 10).collect::<Vec<_>>());
    }

    #[test]
    fn threads_are_named() {
        let pool = WorkerPool::new(2).unwrap();
        let names = pool.map_ordered(&[0, 1], |_| {
            std::thread::current().name().map(str::to_string)
        });
        assert!(names
            .iter()
            .all(|n| n.as_deref().is_some_and(|n| n.starts_with("geodelta-worker-"))));
    }
}
