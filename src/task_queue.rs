//! FIFO task queue with three disjoint states (pending / processing /
//! completed) and an incrementally-maintained URL-presence index.
//!
//! A single `Mutex` guards the whole state (spec §5: "a single mutex around
//! the queue state is sufficient"). `Dequeue` moves a task from pending to
//! processing and updates the index under that one lock, so the dequeue
//! exchange invariant (§8) holds without a separate compare-and-swap step.

use std::collections::{HashMap, VecDeque};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::CaptureOptions;

/// One server-side record of a pending or in-flight capture (spec §3).
#[derive(Debug, Clone)]
pub struct CaptureTask {
    pub task_id: String,
    pub url: String,
    pub labels: Vec<String>,
    pub correlation_id: Option<String>,
    pub capture_options: CaptureOptions,
    pub retry_count: u32,
}

impl CaptureTask {
    pub fn new(
        url: String,
        labels: Vec<String>,
        correlation_id: Option<String>,
        capture_options: CaptureOptions,
    ) -> Self {
        Self {
            task_id: Uuid::new_v4().to_string(),
            url,
            labels,
            correlation_id,
            capture_options,
            retry_count: 0,
        }
    }

    /// Produces the retried copy appended to the pending tail by `Requeue`.
    fn retried(&self) -> Self {
        Self {
            retry_count: self.retry_count + 1,
            ..self.clone()
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
}

#[derive(Debug, Serialize)]
pub struct QueueSnapshot {
    #[serde(flatten)]
    pub counts: QueueCounts,
}

struct TaskQueueState {
    pending: VecDeque<CaptureTask>,
    processing: HashMap<String, CaptureTask>,
    completed_count: usize,
    /// URL -> count of pending+processing tasks with that URL, maintained
    /// incrementally on every mutation (spec §9's allowed O(1) collapse of
    /// the URL-presence index).
    url_counts: HashMap<String, usize>,
}

impl TaskQueueState {
    fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            processing: HashMap::new(),
            completed_count: 0,
            url_counts: HashMap::new(),
        }
    }

    fn index_url(&mut self, url: &str) {
        *self.url_counts.entry(url.to_string()).or_insert(0) += 1;
    }

    fn unindex_url(&mut self, url: &str) {
        if let Some(count) = self.url_counts.get_mut(url) {
            *count -= 1;
            if *count == 0 {
                self.url_counts.remove(url);
            }
        }
    }
}

/// FIFO queue owned exclusively by the `WorkerPool` (spec §4.1).
pub struct TaskQueue {
    state: Mutex<TaskQueueState>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TaskQueueState::new()),
        }
    }

    /// Appends to the pending tail. Callers are responsible for validation.
    pub async fn enqueue(&self, task: CaptureTask) {
        let mut state = self.state.lock().await;
        state.index_url(&task.url);
        state.pending.push_back(task);
    }

    /// Removes the pending head and atomically inserts it into processing
    /// and the URL-presence index.
    pub async fn dequeue(&self) -> Option<CaptureTask> {
        let mut state = self.state.lock().await;
        let task = state.pending.pop_front()?;
        state.processing.insert(task.task_id.clone(), task.clone());
        Some(task)
    }

    /// Removes `task` from processing and appends a `retryCount + 1` copy
    /// to the pending tail — a retried task goes behind every currently
    /// pending task.
    pub async fn requeue(&self, task: &CaptureTask) {
        let mut state = self.state.lock().await;
        state.processing.remove(&task.task_id);
        state.pending.push_back(task.retried());
    }

    /// Removes `task_id` from processing and the URL-presence index, and
    /// records it as completed.
    pub async fn mark_complete(&self, task_id: &str) {
        let mut state = self.state.lock().await;
        if let Some(task) = state.processing.remove(task_id) {
            state.unindex_url(&task.url);
            state.completed_count += 1;
        }
    }

    /// True iff any pending or processing task has this URL. Completed
    /// tasks never count.
    pub async fn has_url(&self, url: &str) -> bool {
        let state = self.state.lock().await;
        state.url_counts.contains_key(url)
    }

    pub async fn snapshot(&self) -> QueueSnapshot {
        let state = self.state.lock().await;
        QueueSnapshot {
            counts: QueueCounts {
                pending: state.pending.len(),
                processing: state.processing.len(),
                completed: state.completed_count,
            },
        }
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Timestamp helper shared by result/record construction elsewhere.
pub fn now_iso8601() -> chrono::DateTime<Utc> {
    Utc::now()
}
