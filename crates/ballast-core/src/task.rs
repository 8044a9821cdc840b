//! Shared bounded task pool — all service task execution lands here,
//! never one dedicated thread per call.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::error::{CoreError, Result};

/// Size-bounded executor over tokio tasks. Cheap to clone; clones share
/// the permit budget.
#[derive(Debug, Clone)]
pub struct TaskPool {
    permits: Arc<Semaphore>,
}

impl TaskPool {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Spawn a future onto the pool. It runs once a permit is free, so at
    /// most `max_concurrent` pool tasks execute at a time.
    pub fn spawn<T, F>(&self, fut: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let handle = tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    return Err(CoreError::Execution {
                        service: "task-pool".to_string(),
                        source: anyhow::Error::new(e),
                    })
                }
            };
            fut.await
        });
        TaskHandle {
            inner: Inner::Spawned(handle),
        }
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

enum Inner<T> {
    Spawned(JoinHandle<Result<T>>),
    /// Pre-resolved result, used for failures decided before spawning
    /// (e.g. a disabled service). Takes no permit and runs nothing.
    Ready(Result<T>),
}

/// Handle to an in-flight service task. Callers observe completion or
/// failure through [`TaskHandle::join`]; dropping the handle detaches the
/// task rather than cancelling it.
pub struct TaskHandle<T> {
    inner: Inner<T>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn ready(result: Result<T>) -> Self {
        Self {
            inner: Inner::Ready(result),
        }
    }

    /// Wait for the task. A panicked or aborted task surfaces as
    /// [`CoreError::Execution`] with the join error as its cause.
    pub async fn join(self) -> Result<T> {
        match self.inner {
            Inner::Spawned(handle) => match handle.await {
                Ok(result) => result,
                Err(e) => Err(CoreError::Execution {
                    service: "task-pool".to_string(),
                    source: anyhow::Error::new(e),
                }),
            },
            Inner::Ready(result) => result,
        }
    }

    pub fn abort(&self) {
        if let Inner::Spawned(handle) = &self.inner {
            handle.abort();
        }
    }

    pub fn is_finished(&self) -> bool {
        match &self.inner {
            Inner::Spawned(handle) => handle.is_finished(),
            Inner::Ready(_) => true,
        }
    }
}
