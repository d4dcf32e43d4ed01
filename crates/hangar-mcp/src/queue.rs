//! Deployment job queue: a bounded channel drained by a fixed worker pool.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::error::RequestError;
use crate::orchestrator::{DeployJob, DeploymentOrchestrator};

/// Hands jobs to whatever executes them.
#[async_trait]
pub trait JobSubmitter: Send + Sync {
    async fn submit(&self, job: DeployJob) -> Result<(), RequestError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSettings {
    pub workers: usize,
    pub capacity: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            workers: 2,
            capacity: 64,
        }
    }
}

/// Cloneable submission side of a [`JobQueue`].
#[derive(Debug, Clone)]
pub struct QueueHandle {
    tx: mpsc::Sender<DeployJob>,
}

#[async_trait]
impl JobSubmitter for QueueHandle {
    async fn submit(&self, job: DeployJob) -> Result<(), RequestError> {
        let id = job.id;
        self.tx
            .send(job)
            .await
            .map_err(|_| RequestError::Submit("job queue is closed".into()))?;
        tracing::debug!("queued deployment job {}", id);
        Ok(())
    }
}

/// Worker pool running one job at a time per worker.
///
/// Workers stop once every [`QueueHandle`] is dropped and the channel is
/// drained.
pub struct JobQueue {
    handle: QueueHandle,
    workers: Vec<JoinHandle<()>>,
}

impl JobQueue {
    pub fn start(orchestrator: Arc<DeploymentOrchestrator>, settings: QueueSettings) -> Self {
        let (tx, rx) = mpsc::channel(settings.capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let workers = (0..settings.workers.max(1))
            .map(|n| tokio::spawn(worker_loop(n, rx.clone(), orchestrator.clone())))
            .collect();
        tracing::info!(
            "job queue started ({} workers, capacity {})",
            settings.workers.max(1),
            settings.capacity.max(1)
        );
        Self {
            handle: QueueHandle { tx },
            workers,
        }
    }

    pub fn handle(&self) -> QueueHandle {
        self.handle.clone()
    }

    /// Close the queue's own handle and wait for the workers to drain.
    pub async fn shutdown(self) {
        drop(self.handle);
        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::error!("queue worker panicked: {}", e);
            }
        }
        tracing::info!("job queue drained");
    }
}

async fn worker_loop(
    n: usize,
    rx: Arc<Mutex<mpsc::Receiver<DeployJob>>>,
    orchestrator: Arc<DeploymentOrchestrator>,
) {
    loop {
        let job = { rx.lock().await.recv().await };
        let Some(job) = job else {
            break;
        };
        let id = job.id;
        tracing::debug!("worker {} picked up {}", n, id);
        // failures are recorded on the record by the orchestrator
        if orchestrator.run_job(job).await.is_err() {
            tracing::debug!("worker {} finished {} with failure", n, id);
        }
    }
    tracing::debug!("worker {} stopped", n);
}
