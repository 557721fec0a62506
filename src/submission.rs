//! Validates incoming submission payloads and forwards them to the
//! `WorkerPool`; serves status queries (spec §4.7).

use serde::{Deserialize, Serialize};

use crate::config::CaptureOptions;
use crate::error::UnavailableError;
use crate::page_capturer::validate_filename_fragment;
use crate::worker_pool::{build_task, PoolStatus, WorkerPool};

/// Logical submission schema (spec §6).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub url: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    pub capture_options: CaptureOptions,
}

/// Logical acknowledgement schema (spec §6). `task_id` is `""` when
/// `accepted` is false.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionAck {
    pub accepted: bool,
    pub task_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubmissionAck {
    fn rejected(error: impl Into<String>) -> Self {
        Self {
            accepted: false,
            task_id: String::new(),
            correlation_id: None,
            error: Some(error.into()),
        }
    }
}

pub struct SubmissionFrontend<'a> {
    pool: &'a WorkerPool,
}

impl<'a> SubmissionFrontend<'a> {
    pub fn new(pool: &'a WorkerPool) -> Self {
        Self { pool }
    }

    /// Validation order (first failure wins), per spec §4.7. Only step 5
    /// (no healthy workers) is a transport-level signal; every other
    /// rejection is an in-band ack with `accepted: false`.
    pub async fn submit(
        &self,
        request: SubmissionRequest,
    ) -> Result<SubmissionAck, UnavailableError> {
        let url = request.url.trim().to_string();
        if url.is_empty() {
            return Ok(SubmissionAck::rejected("url is required"));
        }

        let mut labels = Vec::with_capacity(request.labels.len());
        for label in request.labels {
            let trimmed = label.trim().to_string();
            if trimmed.is_empty() {
                continue;
            }
            if let Err(reason) = validate_filename_fragment(&trimmed) {
                return Ok(SubmissionAck::rejected(reason));
            }
            labels.push(trimmed);
        }

        if let Some(correlation_id) = &request.correlation_id {
            if let Err(reason) = validate_filename_fragment(correlation_id) {
                return Ok(SubmissionAck::rejected(reason));
            }
        }

        if !request.capture_options.is_valid() {
            return Ok(SubmissionAck::rejected(
                "captureOptions must request at least one of png, jpeg, html",
            ));
        }

        if !self.pool.is_running() || self.pool.healthy_worker_count().await == 0 {
            return Err(UnavailableError);
        }

        let task = build_task(url, labels, request.correlation_id.clone(), request.capture_options);
        let task_id = task.task_id.clone();
        let outcome = self.pool.enqueue(task).await;

        if !outcome.success {
            return Ok(SubmissionAck::rejected(
                outcome.error.unwrap_or_else(|| "enqueue rejected".to_string()),
            ));
        }

        Ok(SubmissionAck {
            accepted: true,
            task_id,
            correlation_id: request.correlation_id,
            error: None,
        })
    }

    pub async fn status(&self) -> PoolStatus {
        self.pool.status().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser_gateway::MockBrowserGateway;
    use crate::config::Config;
    use std::sync::Arc;

    async fn pool_with_no_workers() -> Arc<WorkerPool> {
        // initialize() fails with zero configured browsers, so exercise the
        // `unavailable` path via a pool that never started.
        let config = Config {
            browsers: vec![crate::config::BrowserEndpoint {
                endpoint: "ws://placeholder".to_string(),
                slow_mo: 0,
            }],
            ..Config::default()
        };
        let mut gateway = MockBrowserGateway::new();
        gateway.expect_connect().returning(|_, _| {
            Ok(Box::new(crate::browser_gateway::MockSession::new())
                as Box<dyn crate::browser_gateway::Session>)
        });
        Arc::new(
            WorkerPool::initialize(config, Arc::new(gateway), None)
                .await
                .unwrap(),
        )
    }

    fn request(url: &str) -> SubmissionRequest {
        SubmissionRequest {
            url: url.to_string(),
            labels: vec![],
            correlation_id: None,
            capture_options: CaptureOptions {
                png: true,
                jpeg: false,
                html: false,
            },
        }
    }

    #[tokio::test]
    async fn rejects_empty_url() {
        let pool = pool_with_no_workers().await;
        let frontend = SubmissionFrontend::new(&pool);
        let ack = frontend.submit(request("   ")).await.unwrap();
        assert!(!ack.accepted);
        assert_eq!(ack.error.as_deref(), Some("url is required"));
    }

    #[tokio::test]
    async fn rejects_missing_capture_options() {
        let pool = pool_with_no_workers().await;
        let frontend = SubmissionFrontend::new(&pool);
        let mut req = request("https://example.com");
        req.capture_options = CaptureOptions::default();
        let ack = frontend.submit(req).await.unwrap();
        assert!(!ack.accepted);
    }

    #[tokio::test]
    async fn unavailable_before_pool_started() {
        let pool = pool_with_no_workers().await;
        let frontend = SubmissionFrontend::new(&pool);
        let err = frontend.submit(request("https://example.com")).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn accepted_after_pool_started() {
        let pool = pool_with_no_workers().await;
        pool.start().await;
        let frontend = SubmissionFrontend::new(&pool);
        let ack = frontend
            .submit(request("https://example.com"))
            .await
            .unwrap();
        assert!(ack.accepted);
        assert!(!ack.task_id.is_empty());
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn duplicate_rejection_then_acceptance_after_completion() {
        let config = Config {
            reject_duplicate_urls: true,
            browsers: vec![crate::config::BrowserEndpoint {
                endpoint: "ws://placeholder".to_string(),
                slow_mo: 0,
            }],
            ..Config::default()
        };
        let mut gateway = MockBrowserGateway::new();
        gateway.expect_connect().returning(|_, _| {
            Ok(Box::new(crate::browser_gateway::MockSession::new())
                as Box<dyn crate::browser_gateway::Session>)
        });
        let pool = Arc::new(
            WorkerPool::initialize(config, Arc::new(gateway), None)
                .await
                .unwrap(),
        );
        pool.start().await;
        let frontend = SubmissionFrontend::new(&pool);

        let first = frontend
            .submit(request("https://dup.example.com"))
            .await
            .unwrap();
        assert!(first.accepted);

        let second = frontend
            .submit(request("https://dup.example.com"))
            .await
            .unwrap();
        assert!(!second.accepted);
        assert_eq!(
            second.error.as_deref(),
            Some("URL already in queue: https://dup.example.com")
        );
    }
}
