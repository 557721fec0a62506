//! One `Capture(session, task, workerId) -> CaptureResult` operation
//! (spec §4.4): viewport/user-agent setup, bounded navigation, dynamic-
//! content wait, scrollbar hiding, artifact extraction, filename
//! generation, persistence.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::time::timeout;
use tracing::warn;

use crate::browser_gateway::Session;
use crate::config::{Config, Timeouts};
use crate::error::{self, ErrorDetails};
use crate::task_queue::CaptureTask;

const DYNAMIC_CONTENT_WAIT_MS: u64 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CaptureStatus {
    Success,
    HttpError,
    Timeout,
    Failed,
}

/// Outcome of one capture attempt (spec §3).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResult {
    pub task_id: String,
    pub status: CaptureStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<ErrorDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub png_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jpeg_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_path: Option<String>,
    pub capture_processing_time_ms: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub worker_id: String,
}

impl CaptureResult {
    pub fn is_success(&self) -> bool {
        self.status == CaptureStatus::Success
    }
}

/// Filename-fragment validation rules (spec §6), applied to labels and
/// correlationId.
pub fn validate_filename_fragment(name: &str) -> Result<(), String> {
    const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*', '_'];

    if name.trim().is_empty() {
        return Err(format!(
            "Invalid filename \"{name}\": filename cannot be empty"
        ));
    }
    if name.chars().count() > 100 {
        return Err(format!(
            "Invalid filename \"{name}\": filename exceeds 100 characters"
        ));
    }
    if name.chars().any(|c| FORBIDDEN.contains(&c)) {
        return Err(format!(
            "Invalid filename \"{name}\": contains invalid characters: < > : \" / \\ | ? * _"
        ));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(format!(
            "Invalid filename \"{name}\": contains whitespace characters"
        ));
    }
    Ok(())
}

/// Filename generation table (spec §6).
pub fn generate_filename(
    task_id: &str,
    correlation_id: Option<&str>,
    labels: &[String],
    ext: &str,
) -> String {
    let labels_joined = if labels.is_empty() {
        None
    } else {
        Some(labels.join("-"))
    };

    let stem = match (correlation_id, labels_joined) {
        (None, None) => task_id.to_string(),
        (None, Some(labels)) => format!("{task_id}_{labels}"),
        (Some(cid), None) => format!("{task_id}_{cid}"),
        (Some(cid), Some(labels)) => format!("{task_id}_{cid}_{labels}"),
    };
    format!("{stem}.{ext}")
}

pub struct PageCapturer<'a> {
    config: &'a Config,
    output_dir: PathBuf,
    user_agent: Option<&'a str>,
}

impl<'a> PageCapturer<'a> {
    pub fn new(config: &'a Config, user_agent: Option<&'a str>) -> Self {
        Self {
            config,
            output_dir: PathBuf::from(&config.output_dir),
            user_agent,
        }
    }

    pub async fn capture(
        &self,
        session: &dyn Session,
        task: &CaptureTask,
        worker_id: &str,
    ) -> CaptureResult {
        let start = Instant::now();
        let timeouts = &self.config.timeouts;

        let outcome = self.run(session, task, timeouts, start).await;
        self.finish(task, worker_id, start, outcome)
    }

    async fn run(
        &self,
        session: &dyn Session,
        task: &CaptureTask,
        timeouts: &Timeouts,
        start: Instant,
    ) -> Result<RunOutcome, ErrorDetails> {
        let page = session
            .new_page()
            .await
            .map_err(|e| error::classify(&e.to_string()))?;

        let result = self.run_on_page(page.as_ref(), task, timeouts, start).await;
        page.close().await;
        result
    }

    async fn run_on_page(
        &self,
        page: &dyn crate::browser_gateway::BrowserPage,
        task: &CaptureTask,
        timeouts: &Timeouts,
        _start: Instant,
    ) -> Result<RunOutcome, ErrorDetails> {
        page.set_viewport(self.config.viewport.width, self.config.viewport.height)
            .await
            .map_err(|e| error::classify(&e.to_string()))?;

        if let Some(ua) = self.user_agent {
            page.set_user_agent(ua)
                .await
                .map_err(|e| error::classify(&e.to_string()))?;
        }

        let navigation = timeout(
            Duration::from_millis(timeouts.page_load),
            page.goto(&task.url),
        )
        .await
        .map_err(|_| error::timeout_error(timeouts.page_load, "navigation"))?
        .map_err(|e| error::classify(&e.to_string()))?;

        if !(200..300).contains(&navigation.http_status_code) {
            let text = navigation
                .http_status_text
                .or_else(|| error::http_status_text(navigation.http_status_code).map(str::to_string));
            let message = match &text {
                Some(t) => format!("HTTP {} {t}", navigation.http_status_code),
                None => format!("HTTP {}", navigation.http_status_code),
            };
            return Ok(RunOutcome::HttpError {
                code: navigation.http_status_code,
                details: ErrorDetails::Http {
                    http_status_code: navigation.http_status_code,
                    http_status_text: text,
                    message,
                },
            });
        }

        page.wait_millis(DYNAMIC_CONTENT_WAIT_MS)
            .await
            .map_err(|e| error::classify(&e.to_string()))?;
        page.hide_scrollbars()
            .await
            .map_err(|e| error::classify(&e.to_string()))?;

        let mut artifacts = Artifacts::default();
        let capture_bound = Duration::from_millis(timeouts.capture);

        let full_page = self.config.screenshot.full_page;
        if task.capture_options.png {
            let data = timeout(capture_bound, page.screenshot_png(full_page))
                .await
                .map_err(|_| error::timeout_error(timeouts.capture, "png capture"))?
                .map_err(|e| error::classify(&e.to_string()))?;
            artifacts.png = Some(self.persist(task, "png", data)?);
        }
        if task.capture_options.jpeg {
            let data = timeout(
                capture_bound,
                page.screenshot_jpeg(self.config.screenshot.quality, full_page),
            )
            .await
            .map_err(|_| error::timeout_error(timeouts.capture, "jpeg capture"))?
            .map_err(|e| error::classify(&e.to_string()))?;
            artifacts.jpeg = Some(self.persist(task, "jpeg", data)?);
        }
        if task.capture_options.html {
            let html = timeout(capture_bound, page.html())
                .await
                .map_err(|_| error::timeout_error(timeouts.capture, "html extraction"))?
                .map_err(|e| error::classify(&e.to_string()))?;
            artifacts.html = Some(self.persist(task, "html", html.into_bytes())?);
        }

        Ok(RunOutcome::Success {
            http_status_code: navigation.http_status_code,
            artifacts,
        })
    }

    fn persist(&self, task: &CaptureTask, ext: &str, data: Vec<u8>) -> Result<String, ErrorDetails> {
        let filename = generate_filename(
            &task.task_id,
            task.correlation_id.as_deref(),
            &task.labels,
            ext,
        );
        let path = self.output_dir.join(&filename);
        std::fs::write(&path, data).map_err(|e| error::internal_error(e.to_string()))?;
        Ok(path.to_string_lossy().to_string())
    }

    fn finish(
        &self,
        task: &CaptureTask,
        worker_id: &str,
        start: Instant,
        outcome: Result<RunOutcome, ErrorDetails>,
    ) -> CaptureResult {
        let elapsed_ms = start.elapsed().as_millis() as u64;
        let timestamp = chrono::Utc::now();

        match outcome {
            Ok(RunOutcome::Success {
                http_status_code,
                artifacts,
            }) => CaptureResult {
                task_id: task.task_id.clone(),
                status: CaptureStatus::Success,
                http_status_code: Some(http_status_code),
                error_details: None,
                png_path: artifacts.png,
                jpeg_path: artifacts.jpeg,
                html_path: artifacts.html,
                capture_processing_time_ms: elapsed_ms,
                timestamp,
                worker_id: worker_id.to_string(),
            },
            Ok(RunOutcome::HttpError { code, details }) => CaptureResult {
                task_id: task.task_id.clone(),
                status: CaptureStatus::HttpError,
                http_status_code: Some(code),
                error_details: Some(details),
                png_path: None,
                jpeg_path: None,
                html_path: None,
                capture_processing_time_ms: elapsed_ms,
                timestamp,
                worker_id: worker_id.to_string(),
            },
            Err(details) => {
                let status = if details.is_timeout() {
                    CaptureStatus::Timeout
                } else {
                    CaptureStatus::Failed
                };
                if details.is_connection() {
                    warn!(task_id = %task.task_id, worker_id, "capture failed: connection dropped");
                }
                CaptureResult {
                    task_id: task.task_id.clone(),
                    status,
                    http_status_code: None,
                    error_details: Some(details),
                    png_path: None,
                    jpeg_path: None,
                    html_path: None,
                    capture_processing_time_ms: elapsed_ms,
                    timestamp,
                    worker_id: worker_id.to_string(),
                }
            }
        }
    }
}

#[derive(Default)]
struct Artifacts {
    png: Option<String>,
    jpeg: Option<String>,
    html: Option<String>,
}

enum RunOutcome {
    Success {
        http_status_code: u16,
        artifacts: Artifacts,
    },
    HttpError {
        code: u16,
        details: ErrorDetails,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_matrix_from_spec() {
        assert_eq!(
            generate_filename("t", Some("c"), &["a".into(), "b".into()], "png"),
            "t_c_a-b.png"
        );
        assert_eq!(
            generate_filename("t", None, &["a".into(), "b".into()], "png"),
            "t_a-b.png"
        );
        assert_eq!(generate_filename("t", Some("c"), &[], "png"), "t_c.png");
        assert_eq!(generate_filename("t", None, &[], "png"), "t.png");
    }

    #[test]
    fn filename_determinism() {
        let a = generate_filename("t", Some("c"), &["x".into()], "jpeg");
        let b = generate_filename("t", Some("c"), &["x".into()], "jpeg");
        assert_eq!(a, b);
    }

    #[test]
    fn validates_empty_fragment() {
        assert!(validate_filename_fragment("   ").is_err());
    }

    #[test]
    fn validates_length() {
        let long = "a".repeat(101);
        assert!(validate_filename_fragment(&long).is_err());
        let ok = "a".repeat(100);
        assert!(validate_filename_fragment(&ok).is_ok());
    }

    #[test]
    fn validates_forbidden_characters() {
        assert!(validate_filename_fragment("a/b").is_err());
        assert!(validate_filename_fragment("a_b").is_err());
    }

    #[test]
    fn validates_whitespace() {
        assert!(validate_filename_fragment("a b").is_err());
    }

    #[test]
    fn accepts_well_formed_fragment() {
        assert!(validate_filename_fragment("release-42").is_ok());
    }
}
