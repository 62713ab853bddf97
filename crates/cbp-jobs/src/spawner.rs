//! Task scheduling seam.
//!
//! Production uses [`TokioSpawner`] (detached `tokio::spawn`); tests use
//! [`QueueSpawner`], which parks scheduled pipelines so a test can observe
//! the in-flight record state before driving them to completion.

use std::sync::Mutex;

use futures::future::BoxFuture;

/// Schedules a pipeline future for background execution.
pub trait TaskSpawner: Send + Sync {
    fn schedule(&self, task: BoxFuture<'static, ()>);
}

/// Detached execution on the Tokio runtime.
pub struct TokioSpawner;

impl TaskSpawner for TokioSpawner {
    fn schedule(&self, task: BoxFuture<'static, ()>) {
        tokio::spawn(task);
    }
}

/// Test spawner that holds scheduled tasks until explicitly driven.
#[derive(Default)]
pub struct QueueSpawner {
    queue: Mutex<Vec<BoxFuture<'static, ()>>>,
}

impl QueueSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Run every queued task to completion, including tasks queued while
    /// draining.
    pub async fn drain(&self) {
        loop {
            let tasks: Vec<_> = self.queue.lock().unwrap().drain(..).collect();
            if tasks.is_empty() {
                return;
            }
            for task in tasks {
                task.await;
            }
        }
    }
}

impl TaskSpawner for QueueSpawner {
    fn schedule(&self, task: BoxFuture<'static, ()>) {
        self.queue.lock().unwrap().push(task);
    }
}
