//! Bounded background worker pool.
//!
//! Uploads are acknowledged immediately and processed by background tasks.
//! A semaphore caps how many run at once; excess jobs queue on the permit
//! and run in submission order of permit acquisition.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Schedules `job` to run once a worker permit is free. The permit is
    /// held for the job's whole duration.
    pub fn spawn<F>(&self, job: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permits = self.permits.clone();
        tokio::spawn(async move {
            // The semaphore is never closed, but a panic-safe fallback is
            // to simply skip the job if acquisition fails.
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            job.await;
        })
    }
}
