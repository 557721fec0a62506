//! `BrowserGateway`: the opaque `Connect(endpoint) -> Session` capability
//! (spec §2.1, §9). The rest of the dispatch subsystem only ever talks to
//! the `Session`/`BrowserPage` traits below, so it can be driven against a
//! live remote Chrome over CDP or against `mockall`-generated mocks in
//! tests.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    EventResponseReceived, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, CaptureScreenshotParams};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tracing::{error, warn};

use crate::error::GatewayError;

/// One page opened for a single capture attempt. Always closed by the
/// caller on every exit path (spec §3, §4.4 step 9).
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait BrowserPage: Send + Sync {
    async fn set_viewport(&self, width: u32, height: u32) -> Result<(), GatewayError>;
    async fn set_user_agent(&self, user_agent: &str) -> Result<(), GatewayError>;

    /// Navigates and waits for the `dom-content-loaded` lifecycle event,
    /// returning the main-frame HTTP status (0 if none was observed) and
    /// its reason phrase, if the transport supplied one.
    async fn goto(&self, url: &str) -> Result<NavigationOutcome, GatewayError>;

    async fn wait_millis(&self, millis: u64) -> Result<(), GatewayError>;
    async fn hide_scrollbars(&self) -> Result<(), GatewayError>;
    async fn screenshot_png(&self, full_page: bool) -> Result<Vec<u8>, GatewayError>;
    async fn screenshot_jpeg(&self, quality: Option<u8>, full_page: bool) -> Result<Vec<u8>, GatewayError>;
    async fn html(&self) -> Result<String, GatewayError>;
    async fn close(&self);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NavigationOutcome {
    pub http_status_code: u16,
    pub http_status_text: Option<String>,
}

/// A Session is exclusively owned by one Worker for the worker's entire
/// lifetime; individual Pages are scoped to a single capture attempt.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait Session: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>, GatewayError>;
    async fn close(&self);
}

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait BrowserGateway: Send + Sync {
    async fn connect(&self, endpoint: &str, slow_mo: Duration) -> Result<Box<dyn Session>, GatewayError>;
}

/// `chromiumoxide`-backed implementation connecting to an already-running
/// remote browser, as opposed to the teacher's `Browser::launch` which
/// spawns a local Chrome process.
pub struct ChromiumoxideGateway;

#[async_trait]
impl BrowserGateway for ChromiumoxideGateway {
    async fn connect(
        &self,
        endpoint: &str,
        slow_mo: Duration,
    ) -> Result<Box<dyn Session>, GatewayError> {
        let (browser, mut handler) = Browser::connect(endpoint)
            .await
            .map_err(|e| GatewayError::ConnectFailed {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })?;

        if !slow_mo.is_zero() {
            tokio::time::sleep(slow_mo).await;
        }

        // The handler implements Stream and must be polled in a loop for
        // CDP events to be delivered (same pattern the teacher uses for
        // locally-launched browsers).
        tokio::spawn(async move {
            loop {
                match handler.next().await {
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("CDP handler error: {e}");
                        break;
                    }
                    None => break,
                }
            }
        });

        Ok(Box::new(ChromiumoxideSession { browser }))
    }
}

struct ChromiumoxideSession {
    browser: Browser,
}

#[async_trait]
impl Session for ChromiumoxideSession {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>, GatewayError> {
        // Failing to open a page against an already-connected `Browser`
        // handle is the gateway's strongest signal that the session itself
        // is gone, as opposed to one operation on an otherwise-live page.
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| GatewayError::Disconnected(e.to_string()))?;
        Ok(Box::new(ChromiumoxidePage { page }))
    }

    async fn close(&self) {
        if let Err(e) = self.browser.close().await {
            warn!("error closing browser session: {e}");
        }
    }
}

struct ChromiumoxidePage {
    page: Page,
}

#[async_trait]
impl BrowserPage for ChromiumoxidePage {
    async fn set_viewport(&self, width: u32, height: u32) -> Result<(), GatewayError> {
        let params = SetDeviceMetricsOverrideParams::builder()
            .width(width as i64)
            .height(height as i64)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(|e| GatewayError::Operation(e.to_string()))?;
        self.page
            .execute(params)
            .await
            .map_err(|e| GatewayError::Operation(e.to_string()))?;
        Ok(())
    }

    async fn set_user_agent(&self, user_agent: &str) -> Result<(), GatewayError> {
        let params = SetUserAgentOverrideParams::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| GatewayError::Operation(e.to_string()))?;
        self.page
            .execute(params)
            .await
            .map_err(|e| GatewayError::Operation(e.to_string()))?;
        Ok(())
    }

    async fn goto(&self, url: &str) -> Result<NavigationOutcome, GatewayError> {
        let mut events = self
            .page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| GatewayError::Operation(e.to_string()))?;

        self.page
            .goto(url)
            .await
            .map_err(|e| GatewayError::Operation(e.to_string()))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| GatewayError::Operation(e.to_string()))?;

        // The first main-frame response matching the target URL supplies
        // the navigation's status; absence of any event falls back to 0
        // per spec §4.4 step 4.
        if let Some(event) = events.next().await {
            if event.response.url == url || url.starts_with(&event.response.url) {
                return Ok(NavigationOutcome {
                    http_status_code: event.response.status as u16,
                    http_status_text: Some(event.response.status_text.clone())
                        .filter(|s| !s.is_empty()),
                });
            }
        }
        Ok(NavigationOutcome::default())
    }

    async fn wait_millis(&self, millis: u64) -> Result<(), GatewayError> {
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(())
    }

    async fn hide_scrollbars(&self) -> Result<(), GatewayError> {
        self.page
            .evaluate(
                "const style = document.createElement('style');\
                 style.innerHTML = '::-webkit-scrollbar { display: none !important; }';\
                 document.head.appendChild(style);",
            )
            .await
            .map_err(|e| GatewayError::Operation(e.to_string()))?;
        Ok(())
    }

    async fn screenshot_png(&self, full_page: bool) -> Result<Vec<u8>, GatewayError> {
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(full_page)
            .build();
        self.page
            .screenshot(params)
            .await
            .map_err(|e| GatewayError::Operation(e.to_string()))
    }

    async fn screenshot_jpeg(
        &self,
        quality: Option<u8>,
        full_page: bool,
    ) -> Result<Vec<u8>, GatewayError> {
        let mut builder = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Jpeg)
            .full_page(full_page);
        if let Some(q) = quality {
            builder = builder.quality(q as i64);
        }
        self.page
            .screenshot(builder.build())
            .await
            .map_err(|e| GatewayError::Operation(e.to_string()))
    }

    async fn html(&self) -> Result<String, GatewayError> {
        self.page
            .content()
            .await
            .map_err(|e| GatewayError::Operation(e.to_string()))
    }

    async fn close(&self) {
        if let Err(e) = self.page.close().await {
            warn!("error closing page: {e}");
        }
    }
}
