//! # webcap-dispatch
//!
//! A network service that accepts single-URL capture requests (PNG/JPEG,
//! serialized HTML) and dispatches them against a fixed pool of
//! externally-hosted headless browsers reached over the Chrome DevTools
//! Protocol. Submission is fire-and-forget: a task id is returned
//! immediately and the capture is performed in the background, with
//! artifacts written to a configured output directory. A status endpoint
//! exposes live queue and worker telemetry.
//!
//! ## Architecture
//!
//! - [`task_queue`] — FIFO queue with pending/processing/completed states
//!   and a URL-presence index.
//! - [`worker_status`] — the explicit worker lifecycle state machine.
//! - [`browser_gateway`] — the `Connect(endpoint) -> Session` capability,
//!   backed by `chromiumoxide` against a remote CDP endpoint.
//! - [`page_capturer`] — the deterministic per-URL capture algorithm.
//! - [`worker`] — one single-flight executor per configured browser.
//! - [`worker_pool`] — owns the queue and workers, runs dispatch loops,
//!   enforces retry/duplicate-URL policy.
//! - [`submission`] — validates submissions and serves status queries.
//! - [`http`] — the actix-web transport binding submission/status onto
//!   HTTP.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use webcap_dispatch::browser_gateway::ChromiumoxideGateway;
//! use webcap_dispatch::config::Config;
//! use webcap_dispatch::worker_pool::WorkerPool;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let pool = Arc::new(
//!         WorkerPool::initialize(config, Arc::new(ChromiumoxideGateway), None).await?,
//!     );
//!     pool.start().await;
//!     pool.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## CLI usage
//!
//! ```bash
//! webcap-dispatch serve --config config.json --port 8080
//! webcap-dispatch validate-config --config config.json
//! ```

/// Configuration structures and defaults.
pub mod config;

/// Error taxonomy: wire-facing `ErrorDetails`, internal `thiserror` enums,
/// and the failure classifier.
pub mod error;

/// The `BrowserGateway`/`Session`/`BrowserPage` capability, backed by
/// `chromiumoxide` against a remote CDP endpoint.
pub mod browser_gateway;

/// The deterministic per-URL capture algorithm.
pub mod page_capturer;

/// FIFO task queue with a URL-presence index.
pub mod task_queue;

/// The worker lifecycle state machine.
pub mod worker_status;

/// One single-flight executor bound to one configured browser endpoint.
pub mod worker;

/// Owns the queue and workers; runs dispatch loops; enforces policy.
pub mod worker_pool;

/// Validates submissions and serves status queries.
pub mod submission;

/// The actix-web transport binding submission/status onto HTTP.
pub mod http;

/// Command-line interface implementation.
pub mod cli;

#[cfg(test)]
mod tests;
