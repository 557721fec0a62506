//! Owns the `TaskQueue` and all `Worker`s; starts a dispatch loop per
//! healthy worker; enforces retry policy and optional duplicate-URL
//! rejection; publishes aggregate status (spec §4.6).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::browser_gateway::BrowserGateway;
use crate::config::{CaptureOptions, Config};
use crate::task_queue::{CaptureTask, QueueSnapshot, TaskQueue};
use crate::worker::{Worker, WorkerInfo};

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("pool initialization failed: zero of {configured} configured browsers became healthy")]
    NoHealthyWorkers { configured: usize },
}

#[derive(Debug, Serialize)]
pub struct EnqueueOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStatus {
    #[serde(flatten)]
    pub queue: QueueSnapshot,
    pub healthy_workers: usize,
    pub total_workers: usize,
    pub is_running: bool,
    pub workers: Vec<WorkerInfo>,
}

pub struct WorkerPool {
    config: Arc<Config>,
    queue: Arc<TaskQueue>,
    workers: Vec<Arc<Worker>>,
    running: AtomicBool,
    dispatch_handles: RwLock<Vec<JoinHandle<()>>>,
    user_agent: Option<String>,
}

impl WorkerPool {
    /// Constructs one Worker per `config.browsers` entry and attempts
    /// Connect on all of them in parallel. Fails iff zero become healthy.
    pub async fn initialize(
        config: Config,
        gateway: Arc<dyn BrowserGateway>,
        user_agent: Option<String>,
    ) -> Result<Self, PoolError> {
        let configured = config.browsers.len();
        let workers: Vec<Arc<Worker>> = config
            .browsers
            .iter()
            .enumerate()
            .map(|(i, endpoint)| {
                Arc::new(Worker::new(
                    format!("worker-{}", i + 1),
                    endpoint.endpoint.clone(),
                    gateway.clone(),
                    Duration::from_millis(endpoint.slow_mo),
                ))
            })
            .collect();

        join_all(workers.iter().map(|w| {
            let w = w.clone();
            async move { w.connect().await }
        }))
        .await;

        let healthy_count = {
            let mut count = 0;
            for w in &workers {
                if w.healthy().await {
                    count += 1;
                }
            }
            count
        };
        if healthy_count == 0 {
            return Err(PoolError::NoHealthyWorkers { configured });
        }

        Ok(Self {
            config: Arc::new(config),
            queue: Arc::new(TaskQueue::new()),
            workers,
            running: AtomicBool::new(false),
            dispatch_handles: RwLock::new(Vec::new()),
            user_agent,
        })
    }

    /// Flips `running=true` and spawns one dispatch loop per currently
    /// healthy worker. Idempotent against repeated calls.
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("starting worker pool with {} workers", self.workers.len());

        let mut handles = self.dispatch_handles.write().await;
        for worker in &self.workers {
            if !worker.healthy().await {
                continue;
            }
            let pool = self.clone();
            let worker = worker.clone();
            handles.push(tokio::spawn(async move {
                pool.dispatch_loop(worker).await;
            }));
        }
    }

    async fn dispatch_loop(self: Arc<Self>, worker: Arc<Worker>) {
        while self.running.load(Ordering::SeqCst) && worker.healthy().await {
            let task = match self.queue.dequeue().await {
                Some(task) => task,
                None => {
                    tokio::time::sleep(Duration::from_millis(self.config.queue_poll_interval_ms))
                        .await;
                    continue;
                }
            };

            let result = worker
                .process(&self.config, self.user_agent.as_deref(), &task)
                .await;

            if !result.is_success() && task.retry_count < self.config.max_retries {
                self.queue.requeue(&task).await;
            } else {
                self.queue.mark_complete(&task.task_id).await;
            }

            if !worker.healthy().await {
                warn!(worker_id = %worker.id, "worker unhealthy, dispatch loop exiting");
                break;
            }
        }
    }

    /// Appends `task` to the queue, honoring `rejectDuplicateUrls`.
    pub async fn enqueue(&self, task: CaptureTask) -> EnqueueOutcome {
        if self.config.reject_duplicate_urls && self.queue.has_url(&task.url).await {
            return EnqueueOutcome {
                success: false,
                error: Some(format!("URL already in queue: {}", task.url)),
            };
        }
        self.queue.enqueue(task).await;
        EnqueueOutcome {
            success: true,
            error: None,
        }
    }

    pub async fn has_url(&self, url: &str) -> bool {
        self.queue.has_url(url).await
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn healthy_worker_count(&self) -> usize {
        let mut count = 0;
        for w in &self.workers {
            if w.healthy().await {
                count += 1;
            }
        }
        count
    }

    /// Stops dispatch (each loop finishes its in-flight capture, if any),
    /// then disconnects every worker in parallel. Safe to call once;
    /// subsequent calls are undefined (spec §4.6).
    pub async fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        let handles: Vec<_> = self.dispatch_handles.write().await.drain(..).collect();
        join_all(handles).await;

        join_all(self.workers.iter().map(|w| {
            let w = w.clone();
            async move { w.disconnect().await }
        }))
        .await;
        info!("worker pool shut down");
    }

    pub async fn status(&self) -> PoolStatus {
        let mut workers = Vec::with_capacity(self.workers.len());
        for w in &self.workers {
            workers.push(w.snapshot().await);
        }
        PoolStatus {
            queue: self.queue.snapshot().await,
            healthy_workers: self.healthy_worker_count().await,
            total_workers: self.workers.len(),
            is_running: self.is_running(),
            workers,
        }
    }
}

/// Convenience constructor used by `SubmissionFrontend` when building a
/// `CaptureTask` from a validated request.
pub fn build_task(
    url: String,
    labels: Vec<String>,
    correlation_id: Option<String>,
    capture_options: CaptureOptions,
) -> CaptureTask {
    CaptureTask::new(url, labels, correlation_id, capture_options)
}
