//! Batch dispatch strategies
//!
//! Both strategies run one job per batch and hand back the outputs in batch
//! order. Only [`Dispatch::Concurrent`] can fail structurally (a task panics or
//! is cancelled); job-level failures are the job's own business.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

use crate::error::{Result, RetrievalError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Tokio tasks, at most `workers` in flight
    Concurrent { workers: usize },
    /// One batch after another on the calling task
    Sequential,
}

impl Dispatch {
    /// Run `job` for every batch and collect the outputs in batch order
    ///
    /// # Errors
    ///
    /// * `RetrievalError::DispatchFailed` - If a concurrent task panicked or the
    ///   worker pool shut down
    pub async fn run<T, F, Fut>(&self, batches: &[String], job: F) -> Result<Vec<T>>
    where
        F: Fn(usize, String) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        match *self {
            Dispatch::Sequential => {
                let mut outputs = Vec::with_capacity(batches.len());
                for (index, batch) in batches.iter().enumerate() {
                    outputs.push(job(index, batch.clone()).await);
                }
                Ok(outputs)
            }
            Dispatch::Concurrent { workers } => run_concurrent(workers, batches, job).await,
        }
    }
}

async fn run_concurrent<T, F, Fut>(workers: usize, batches: &[String], job: F) -> Result<Vec<T>>
where
    F: Fn(usize, String) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut tasks = JoinSet::new();

    for (index, batch) in batches.iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let work = job(index, batch.clone());
        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|err| RetrievalError::DispatchFailed(err.to_string()))?;
            debug!(batch = index, "Worker picked up batch");
            Ok::<_, RetrievalError>((index, work.await))
        });
    }

    let mut outputs = Vec::with_capacity(batches.len());
    while let Some(joined) = tasks.join_next().await {
        // Dropping the set on early return aborts the remaining tasks
        let (index, output) =
            joined.map_err(|err| RetrievalError::DispatchFailed(err.to_string()))??;
        outputs.push((index, output));
    }

    outputs.sort_by_key(|(index, _)| *index);
    Ok(outputs.into_iter().map(|(_, output)| output).collect())
}
