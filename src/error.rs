//! Error taxonomy for the dispatch subsystem.
//!
//! [`ErrorDetails`] is the tagged, wire-shaped outcome attached to a
//! [`crate::page_capturer::CaptureResult`]. [`GatewayError`] and
//! [`SubmissionError`] are ordinary `thiserror` enums used at each component
//! boundary; a capture attempt never lets one of these escape past
//! [`crate::page_capturer::PageCapturer::capture`] — they are always folded
//! into an `ErrorDetails` first, via [`classify`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reaching or using a configured browser endpoint.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("failed to connect to browser endpoint {endpoint}: {message}")]
    ConnectFailed { endpoint: String, message: String },

    /// The session itself is gone — the browser process died or the CDP
    /// connection dropped. Reserved for genuine session loss, detected
    /// where a live `Session`/`Browser` handle stops answering (spec §9's
    /// substring rule is the fallback classifier for this, not the source
    /// of truth here).
    #[error("session disconnected: {0}")]
    Disconnected(String),

    /// An ordinary page operation (navigation, screenshot, script
    /// evaluation, content extraction, ...) failed without the underlying
    /// session itself being lost. Classified via [`classify`] at the
    /// `PageCapturer` boundary rather than assumed to be a connection drop.
    #[error("page operation failed: {0}")]
    Operation(String),
}

/// Rejection of a malformed submission, surfaced in-band (never logged as a
/// server fault — see spec §7).
#[derive(Debug, Clone, Error)]
pub enum SubmissionError {
    #[error("url is required")]
    MissingUrl,

    #[error("{0}")]
    InvalidFragment(String),

    #[error("captureOptions must request at least one of png, jpeg, html")]
    NoCaptureOptions,

    #[error("{0}")]
    Rejected(String),
}

/// Transport-level unavailability signal (spec §4.7 step 5 / §7).
#[derive(Debug, Clone, Error)]
#[error("No healthy workers available")]
pub struct UnavailableError;

/// Tagged classification of a capture failure (spec §3, §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ErrorDetails {
    Http {
        http_status_code: u16,
        #[serde(skip_serializing_if = "Option::is_none")]
        http_status_text: Option<String>,
        message: String,
    },
    Timeout {
        #[serde(skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
        message: String,
    },
    Connection {
        message: String,
    },
    Internal {
        message: String,
    },
}

impl ErrorDetails {
    pub fn message(&self) -> &str {
        match self {
            ErrorDetails::Http { message, .. } => message,
            ErrorDetails::Timeout { message, .. } => message,
            ErrorDetails::Connection { message } => message,
            ErrorDetails::Internal { message } => message,
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, ErrorDetails::Connection { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ErrorDetails::Timeout { .. })
    }
}

/// HTTP status text fallback table (spec §6), used when the navigation
/// response did not supply its own reason phrase.
pub fn http_status_text(code: u16) -> Option<&'static str> {
    Some(match code {
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => return None,
    })
}

pub fn http_error(code: u16, text: Option<String>) -> ErrorDetails {
    let resolved_text = text.or_else(|| http_status_text(code).map(str::to_string));
    let message = match &resolved_text {
        Some(t) => format!("HTTP {code} {t}"),
        None => format!("HTTP {code}"),
    };
    ErrorDetails::Http {
        http_status_code: code,
        http_status_text: resolved_text,
        message,
    }
}

pub fn timeout_error(ms: u64, op: &str) -> ErrorDetails {
    ErrorDetails::Timeout {
        timeout_ms: Some(ms),
        message: format!("{op} timed out after {ms}ms"),
    }
}

pub fn connection_error(reason: impl Into<String>) -> ErrorDetails {
    ErrorDetails::Connection {
        message: reason.into(),
    }
}

pub fn internal_error(message: impl Into<String>) -> ErrorDetails {
    ErrorDetails::Internal {
        message: message.into(),
    }
}

static TIMEOUT_MS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((\d+)ms\)").expect("static pattern is valid"));

/// `ErrorClassifier.FromException` (spec §4.5): maps a raw failure message
/// to a tagged [`ErrorDetails`].
pub fn classify(message: &str) -> ErrorDetails {
    if message.contains("Timeout") {
        let timeout_ms = TIMEOUT_MS_PATTERN
            .captures(message)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u64>().ok());
        return ErrorDetails::Timeout {
            timeout_ms,
            message: message.to_string(),
        };
    }
    if message.contains("disconnect") || message.contains("closed") {
        return ErrorDetails::Connection {
            message: message.to_string(),
        };
    }
    ErrorDetails::Internal {
        message: message.to_string(),
    }
}

/// Fragile-but-deliberate disconnect detection (spec §9): a Worker
/// transitions to `error` when a failure's message mentions a dropped
/// session, regardless of which `ErrorDetails` variant it was classified as.
pub fn indicates_disconnect(message: &str) -> bool {
    message.contains("disconnect") || message.contains("closed")
}
