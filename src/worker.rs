//! One worker per configured browser endpoint (spec §4.3). Holds a
//! `Session`, drives `PageCapturer`, and records counters and a bounded,
//! newest-first error history.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::browser_gateway::{BrowserGateway, Session};
use crate::config::Config;
use crate::error::{self, ErrorDetails};
use crate::page_capturer::{CaptureResult, CaptureStatus, PageCapturer};
use crate::task_queue::CaptureTask;
use crate::worker_status::{WorkerState, WorkerStatusManager};

const ERROR_HISTORY_LIMIT: usize = 10;

/// A point-in-time record of a failed capture or connect attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub error_details: ErrorDetails,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskIdentity>,
}

/// Subset of a task's identity retained in error history (spec §3).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskIdentity {
    pub task_id: String,
    pub url: String,
    pub labels: Vec<String>,
}

impl From<&CaptureTask> for TaskIdentity {
    fn from(task: &CaptureTask) -> Self {
        Self {
            task_id: task.task_id.clone(),
            url: task.url.clone(),
            labels: task.labels.clone(),
        }
    }
}

/// By-value snapshot returned to status callers; `error_history` is always
/// a defensive copy (spec §5).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerInfo {
    pub id: String,
    pub browser_endpoint: String,
    pub status: WorkerState,
    pub processed_count: u64,
    pub error_count: u64,
    pub error_history: Vec<ErrorRecord>,
}

struct WorkerInner {
    status: WorkerStatusManager,
    processed_count: u64,
    error_count: u64,
    error_history: VecDeque<ErrorRecord>,
}

pub struct Worker {
    pub id: String,
    pub browser_endpoint: String,
    gateway: Arc<dyn BrowserGateway>,
    slow_mo: std::time::Duration,
    session: Mutex<Option<Box<dyn Session>>>,
    state: Mutex<WorkerInner>,
}

impl Worker {
    pub fn new(
        id: String,
        browser_endpoint: String,
        gateway: Arc<dyn BrowserGateway>,
        slow_mo: std::time::Duration,
    ) -> Self {
        Self {
            id,
            browser_endpoint,
            gateway,
            slow_mo,
            session: Mutex::new(None),
            state: Mutex::new(WorkerInner {
                status: WorkerStatusManager::new(),
                processed_count: 0,
                error_count: 0,
                error_history: VecDeque::new(),
            }),
        }
    }

    /// Attempts to open a Session via the BrowserGateway. `stopped -> idle`
    /// on success, `stopped -> error` on failure.
    pub async fn connect(&self) -> bool {
        match self
            .gateway
            .connect(&self.browser_endpoint, self.slow_mo)
            .await
        {
            Ok(session) => {
                *self.session.lock().await = Some(session);
                let mut state = self.state.lock().await;
                state
                    .status
                    .transition(WorkerState::Idle)
                    .expect("stopped -> idle is a legal transition");
                info!(worker_id = %self.id, "connected to {}", self.browser_endpoint);
                true
            }
            Err(e) => {
                let mut state = self.state.lock().await;
                state
                    .status
                    .transition(WorkerState::Error)
                    .expect("stopped -> error is a legal transition");
                state.error_count += 1;
                push_error_record(
                    &mut state.error_history,
                    ErrorRecord {
                        error_details: error::connection_error(e.to_string()),
                        timestamp: Utc::now(),
                        task: None,
                    },
                );
                error!(worker_id = %self.id, "failed to connect to {}: {e}", self.browser_endpoint);
                false
            }
        }
    }

    /// Best-effort Session close; errors are swallowed.
    pub async fn disconnect(&self) {
        if let Some(session) = self.session.lock().await.take() {
            session.close().await;
        }
        let mut state = self.state.lock().await;
        let _ = state.status.transition(WorkerState::Stopped);
    }

    pub async fn process(
        &self,
        config: &Config,
        user_agent: Option<&str>,
        task: &CaptureTask,
    ) -> CaptureResult {
        let healthy_and_idle = {
            let state = self.state.lock().await;
            state.status.can_process()
        };
        let has_session = self.session.lock().await.is_some();

        if !healthy_and_idle || !has_session {
            return synthetic_failure(task, &self.id);
        }

        {
            let mut state = self.state.lock().await;
            state
                .status
                .transition(WorkerState::Busy)
                .expect("idle -> busy is a legal transition");
        }

        let session_guard = self.session.lock().await;
        let session = session_guard.as_ref().expect("checked above");
        let capturer = PageCapturer::new(config, user_agent);
        let result = capturer.capture(session.as_ref(), task, &self.id).await;
        drop(session_guard);

        self.record_outcome(task, &result).await;
        result
    }

    async fn record_outcome(&self, task: &CaptureTask, result: &CaptureResult) {
        let mut state = self.state.lock().await;
        state.processed_count += 1;

        let disconnected = if result.status != CaptureStatus::Success {
            state.error_count += 1;
            let message = result
                .error_details
                .as_ref()
                .map(|d| d.message().to_string())
                .unwrap_or_default();
            push_error_record(
                &mut state.error_history,
                ErrorRecord {
                    error_details: result
                        .error_details
                        .clone()
                        .unwrap_or_else(|| error::internal_error("unknown failure")),
                    timestamp: result.timestamp,
                    task: Some(task.into()),
                },
            );
            error::indicates_disconnect(&message)
        } else {
            false
        };

        if disconnected {
            warn!(worker_id = %self.id, "session appears disconnected, entering error state");
            state
                .status
                .transition(WorkerState::Error)
                .expect("busy -> error is a legal transition");
        } else {
            state
                .status
                .transition(WorkerState::Idle)
                .expect("busy -> idle is a legal transition");
        }
    }

    pub async fn snapshot(&self) -> WorkerInfo {
        let state = self.state.lock().await;
        WorkerInfo {
            id: self.id.clone(),
            browser_endpoint: self.browser_endpoint.clone(),
            status: state.status.state(),
            processed_count: state.processed_count,
            error_count: state.error_count,
            error_history: state.error_history.iter().cloned().collect(),
        }
    }

    pub async fn healthy(&self) -> bool {
        self.state.lock().await.status.healthy()
    }
}

fn push_error_record(history: &mut VecDeque<ErrorRecord>, record: ErrorRecord) {
    history.push_front(record);
    if history.len() > ERROR_HISTORY_LIMIT {
        history.pop_back();
    }
}

/// Synthetic result for an unhealthy/sessionless worker (spec §4.3): no
/// counters or state are touched.
fn synthetic_failure(task: &CaptureTask, worker_id: &str) -> CaptureResult {
    CaptureResult {
        task_id: task.task_id.clone(),
        status: CaptureStatus::Failed,
        http_status_code: None,
        error_details: Some(error::internal_error("worker is not healthy")),
        png_path: None,
        jpeg_path: None,
        html_path: None,
        capture_processing_time_ms: 0,
        timestamp: Utc::now(),
        worker_id: worker_id.to_string(),
    }
}
