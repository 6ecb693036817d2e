//! Bounded task queue and the workers draining it.
//!
//! `worker_count` tokio tasks share one `mpsc::Receiver` behind a mutex, so
//! each queued task is delivered to exactly one worker, exactly once. There
//! are no retries: a failed task stays FAILED.
//!
//! Each run is spawned as its own tokio task and wrapped in
//! `tokio::time::timeout`. On expiry the run is aborted and awaited, so its
//! workspace is gone before the task is recorded FAILED with code `timeout`.
//! A panic inside a run is recorded FAILED with code `internal` and the
//! worker keeps going.

use super::{TaskId, TaskRegistry, TaskSpec};
use crate::error::CompressError;
use crate::pipeline::CompressionWorker;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Sizing and limits for a [`WorkerPool`].
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub task_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            worker_count: 2,
            queue_capacity: 64,
            task_timeout: Duration::from_secs(300),
        }
    }
}

/// Handle to the running workers; submitting goes through here.
pub struct WorkerPool {
    sender: mpsc::Sender<TaskSpec>,
    registry: Arc<TaskRegistry>,
    capacity: usize,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn the workers. Must be called inside a tokio runtime.
    pub fn start(
        worker: Arc<CompressionWorker>,
        registry: Arc<TaskRegistry>,
        options: PoolOptions,
    ) -> Self {
        let capacity = options.queue_capacity.max(1);
        let (sender, receiver) = mpsc::channel::<TaskSpec>(capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        let handles = (0..options.worker_count.max(1))
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    Arc::clone(&receiver),
                    Arc::clone(&worker),
                    Arc::clone(&registry),
                    options.task_timeout,
                ))
            })
            .collect::<Vec<_>>();

        info!(
            "Started {} worker(s), queue capacity {}",
            handles.len(),
            capacity
        );

        Self {
            sender,
            registry,
            capacity,
            handles,
        }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Record `spec` as PENDING and queue it. Returns without waiting.
    pub fn submit(&self, spec: TaskSpec) -> Result<TaskId, CompressError> {
        let id = self.registry.insert_pending(spec.clone());
        match self.sender.try_send(spec) {
            Ok(()) => {
                debug!("Task {} queued", id);
                Ok(id)
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.registry.remove(&id);
                warn!("Queue full, rejecting task {}", id);
                Err(CompressError::QueueFull {
                    capacity: self.capacity,
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.registry.remove(&id);
                Err(CompressError::Internal("worker pool has shut down".into()))
            }
        }
    }

    /// Stop accepting work, let queued tasks finish, and wait for workers.
    pub async fn shutdown(self) {
        drop(self.sender);
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!("Worker exited abnormally: {}", e);
            }
        }
        info!("Worker pool stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<TaskSpec>>>,
    worker: Arc<CompressionWorker>,
    registry: Arc<TaskRegistry>,
    task_timeout: Duration,
) {
    debug!("Worker {} started", worker_id);
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(spec) = next else { break };
        run_one(worker_id, spec, &worker, &registry, task_timeout).await;
    }
    debug!("Worker {} stopped", worker_id);
}

async fn run_one(
    worker_id: usize,
    spec: TaskSpec,
    worker: &Arc<CompressionWorker>,
    registry: &Arc<TaskRegistry>,
    task_timeout: Duration,
) {
    let id = spec.task_id;
    if !registry.mark_running(&id) {
        debug!("Worker {}: task {} no longer pending, skipping", worker_id, id);
        return;
    }
    info!("Worker {}: running task {}", worker_id, id);

    let sink = registry.progress_for(id);
    let worker = Arc::clone(worker);
    let mut handle = tokio::spawn(async move { worker.run(&spec, &sink).await });

    let outcome = match tokio::time::timeout(task_timeout, &mut handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(CompressError::Internal(format!(
            "task panicked: {}",
            join_err
        ))),
        Err(_) => {
            handle.abort();
            // Wait for the cancelled run to drop its workspace before the
            // task is reported as failed.
            let _ = handle.await;
            Err(CompressError::Timeout {
                secs: task_timeout.as_secs(),
            })
        }
    };

    match outcome {
        Ok(result) => {
            info!(
                "Task {} succeeded: {} ({:.1}% smaller)",
                id, result.compressed_key, result.compression_ratio
            );
            registry.complete(&id, result);
        }
        Err(e) => {
            error!("Task {} failed [{}]: {}", id, e.code(), e);
            registry.fail(&id, &e);
        }
    }
}
