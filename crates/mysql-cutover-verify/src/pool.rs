//! Bounded-concurrency worker pool over indexed jobs.
//!
//! Runs exactly `concurrency` workers over `job_count` jobs. Workers pull
//! the next job index from a shared atomic cursor; after the first job
//! error no further jobs are started, while in-flight jobs run to
//! completion. Each finished job stores its value in the slot for its
//! index, so the result vector is sparse when the pool aborted early and
//! callers must tolerate empty slots.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{Result, VerifyError};

/// Fixed-width executor for indexed jobs.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    concurrency: usize,
}

impl WorkerPool {
    /// Create a pool running `concurrency` workers. Zero is clamped to one.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    /// Run `process` for every index in `0..job_count`.
    ///
    /// Returns one result slot per job index plus the first error any job
    /// returned. A `None` slot means the job never started because the
    /// pool aborted, or the job itself was the one that errored.
    pub async fn run<T, F, Fut>(
        &self,
        job_count: usize,
        process: F,
    ) -> (Vec<Option<T>>, Option<VerifyError>)
    where
        T: Send + 'static,
        F: Fn(usize) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let process = Arc::new(process);
        let next_index = Arc::new(AtomicUsize::new(0));
        let abort = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(self.concurrency);
        for _ in 0..self.concurrency {
            let process = process.clone();
            let next_index = next_index.clone();
            let abort = abort.clone();

            workers.push(tokio::spawn(async move {
                let mut completed: Vec<(usize, T)> = Vec::new();
                let mut first_error = None;

                loop {
                    if abort.load(Ordering::SeqCst) {
                        break;
                    }
                    let index = next_index.fetch_add(1, Ordering::SeqCst);
                    if index >= job_count {
                        break;
                    }

                    match process(index).await {
                        Ok(value) => completed.push((index, value)),
                        Err(err) => {
                            abort.store(true, Ordering::SeqCst);
                            first_error = Some(err);
                            break;
                        }
                    }
                }

                (completed, first_error)
            }));
        }

        let mut results: Vec<Option<T>> = std::iter::repeat_with(|| None).take(job_count).collect();
        let mut first_error = None;

        for worker in workers {
            match worker.await {
                Ok((completed, worker_error)) => {
                    for (index, value) in completed {
                        results[index] = Some(value);
                    }
                    if first_error.is_none() {
                        first_error = worker_error;
                    }
                }
                Err(join_error) => {
                    if first_error.is_none() {
                        first_error = Some(VerifyError::protocol(format!(
                            "worker task failed: {join_error}"
                        )));
                    }
                }
            }
        }

        (results, first_error)
    }
}
