//! Configuration management with serde serialization/deserialization.
//!
//! Mirrors the configuration keys of the external interface: an output
//! directory, per-stage timeouts, retry/poll policy, viewport and
//! screenshot settings, duplicate-URL rejection, and the list of remote
//! browser endpoints this instance dispatches work to.

use serde::{Deserialize, Serialize};

/// Top-level configuration, loaded from a JSON file by `cli::load_config`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Directory artifacts are written to. Must already exist and be
    /// writable; the service does not create it.
    pub output_dir: String,

    /// Per-stage wall-clock bounds.
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Maximum number of retries per task after the first attempt
    /// (default: 2 — three total attempts).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// How long a dispatch loop sleeps when it finds the queue empty
    /// (default: 50ms).
    #[serde(default = "default_queue_poll_interval_ms")]
    pub queue_poll_interval_ms: u64,

    #[serde(default)]
    pub viewport: Viewport,

    #[serde(default)]
    pub screenshot: ScreenshotSettings,

    /// When true, a submission whose URL is already pending or processing
    /// is rejected rather than enqueued (default: false).
    #[serde(default)]
    pub reject_duplicate_urls: bool,

    /// Remote, already-running headless browsers this instance connects to.
    /// One Worker is created per entry.
    pub browsers: Vec<BrowserEndpoint>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: "./output".to_string(),
            timeouts: Timeouts::default(),
            max_retries: default_max_retries(),
            queue_poll_interval_ms: default_queue_poll_interval_ms(),
            viewport: Viewport::default(),
            screenshot: ScreenshotSettings::default(),
            reject_duplicate_urls: false,
            browsers: Vec::new(),
        }
    }
}

fn default_max_retries() -> u32 {
    2
}

fn default_queue_poll_interval_ms() -> u64 {
    50
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeouts {
    /// Wall-clock bound on navigation (default: 30000ms).
    #[serde(default = "default_page_load_timeout")]
    pub page_load: u64,
    /// Wall-clock bound on a single artifact extraction (default: 10000ms).
    #[serde(default = "default_capture_timeout")]
    pub capture: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            page_load: default_page_load_timeout(),
            capture: default_capture_timeout(),
        }
    }
}

fn default_page_load_timeout() -> u64 {
    30_000
}

fn default_capture_timeout() -> u64 {
    10_000
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct Viewport {
    #[serde(default = "default_viewport_width")]
    pub width: u32,
    #[serde(default = "default_viewport_height")]
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: default_viewport_width(),
            height: default_viewport_height(),
        }
    }
}

fn default_viewport_width() -> u32 {
    1280
}

fn default_viewport_height() -> u32 {
    800
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotSettings {
    #[serde(default)]
    pub full_page: bool,
    /// 1-100; only meaningful for jpeg.
    #[serde(default)]
    pub quality: Option<u8>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserEndpoint {
    /// A connectable CDP WebSocket/HTTP debugger address.
    pub endpoint: String,
    /// Artificial delay chromiumoxide applies between commands, in ms.
    #[serde(default)]
    pub slow_mo: u64,
}

/// Which artifacts a submission asked for. Validated by `SubmissionFrontend`
/// (at least one flag true) before a `CaptureTask` is built.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct CaptureOptions {
    #[serde(default)]
    pub png: bool,
    #[serde(default)]
    pub jpeg: bool,
    #[serde(default)]
    pub html: bool,
}

impl CaptureOptions {
    pub fn is_valid(&self) -> bool {
        self.png || self.jpeg || self.html
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_spec_defaults() {
        let config = Config::default();
        assert_eq!(config.timeouts.page_load, 30_000);
        assert_eq!(config.timeouts.capture, 10_000);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.queue_poll_interval_ms, 50);
        assert_eq!(config.viewport.width, 1280);
        assert_eq!(config.viewport.height, 800);
        assert!(!config.reject_duplicate_urls);
        assert!(config.browsers.is_empty());
    }

    #[test]
    fn deserializes_partial_json_with_defaults() {
        let json = r#"{"outputDir": "/tmp/out", "browsers": [{"endpoint": "ws://localhost:9222"}]}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.output_dir, "/tmp/out");
        assert_eq!(config.browsers.len(), 1);
        assert_eq!(config.browsers[0].slow_mo, 0);
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn capture_options_validity() {
        assert!(!CaptureOptions::default().is_valid());
        assert!(CaptureOptions {
            png: true,
            ..Default::default()
        }
        .is_valid());
    }
}
