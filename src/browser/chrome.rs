//! Chromium backend driven over the DevTools protocol
//!
//! Request interception uses the CDP Fetch domain: every paused request is
//! decided on its own task and answered with exactly one
//! `Fetch.continueRequest` or `Fetch.failRequest`.

use crate::browser::{
    BrowserError, BrowserLauncher, BrowserPage, BrowserResult, BrowserSession, RequestInterceptor,
    ResourceKind, Viewport,
};
use crate::config::BrowserConfig;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams, RequestPattern,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use chromiumoxide::Page;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Flags for running inside a container without a GPU or user namespaces
const LAUNCH_ARGS: &[&str] = &[
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--disable-setuid-sandbox",
    "--no-zygote",
    "--disable-extensions",
    "--mute-audio",
];

/// Launches headless chromium processes
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeLauncher;

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self, config: &BrowserConfig) -> BrowserResult<Arc<dyn BrowserSession>> {
        let mut builder = ChromeConfig::builder()
            .no_sandbox()
            .window_size(config.viewport_width, config.viewport_height);

        for arg in LAUNCH_ARGS {
            builder = builder.arg(*arg);
        }

        if let Some(path) = &config.executable_path {
            builder = builder.chrome_executable(path);
        }

        let chrome_config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(chrome_config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

        Ok(Arc::new(ChromeSession {
            browser: Mutex::new(Some(browser)),
            handler_task,
        }))
    }
}

/// A running chromium process
struct ChromeSession {
    browser: Mutex<Option<Browser>>,
    handler_task: JoinHandle<()>,
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn new_page(&self) -> BrowserResult<Box<dyn BrowserPage>> {
        let guard = self.browser.lock().await;
        let browser = guard.as_ref().ok_or(BrowserError::Closed)?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Page(e.to_string()))?;

        Ok(Box::new(ChromePage { page }))
    }

    async fn close(&self) -> BrowserResult<()> {
        let mut guard = self.browser.lock().await;
        if let Some(mut browser) = guard.take() {
            browser
                .close()
                .await
                .map_err(|e| BrowserError::Page(e.to_string()))?;
            if let Err(e) = browser.wait().await {
                tracing::debug!("Browser process wait failed: {}", e);
            }
        }
        self.handler_task.abort();
        Ok(())
    }
}

/// One chromium tab
struct ChromePage {
    page: Page,
}

#[async_trait]
impl BrowserPage for ChromePage {
    async fn configure(&self, viewport: Viewport, user_agent: &str) -> BrowserResult<()> {
        self.page
            .execute(SetDeviceMetricsOverrideParams::new(
                i64::from(viewport.width),
                i64::from(viewport.height),
                1.0,
                false,
            ))
            .await
            .map_err(|e| BrowserError::Page(e.to_string()))?;

        self.page
            .execute(SetUserAgentOverrideParams::new(user_agent))
            .await
            .map_err(|e| BrowserError::Page(e.to_string()))?;

        Ok(())
    }

    async fn intercept(&self, interceptor: RequestInterceptor) -> BrowserResult<()> {
        // Subscribe before enabling so no paused request is missed
        let mut paused = self
            .page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(|e| BrowserError::Page(e.to_string()))?;

        self.page
            .execute(
                EnableParams::builder()
                    .pattern(RequestPattern::builder().url_pattern("*").build())
                    .build(),
            )
            .await
            .map_err(|e| BrowserError::Page(e.to_string()))?;

        let page = self.page.clone();
        tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let page = page.clone();
                let interceptor = interceptor.clone();
                tokio::spawn(async move {
                    let kind = resource_kind(&event.resource_type);
                    let verdict = interceptor.decide(&event.request.url, kind).await;

                    let answered = if verdict.is_allowed() {
                        page.execute(ContinueRequestParams::new(event.request_id.clone()))
                            .await
                            .map(|_| ())
                    } else {
                        page.execute(FailRequestParams::new(
                            event.request_id.clone(),
                            ErrorReason::BlockedByClient,
                        ))
                        .await
                        .map(|_| ())
                    };

                    // Fails once the page is gone; the request dies with it
                    if let Err(e) = answered {
                        tracing::trace!("Could not answer paused request: {}", e);
                    }
                });
            }
        });

        Ok(())
    }

    async fn goto(&self, url: &str) -> BrowserResult<()> {
        self.page
            .goto(url)
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    async fn evaluate(&self, script: &str) -> BrowserResult<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn content(&self) -> BrowserResult<String> {
        self.page
            .content()
            .await
            .map_err(|e| BrowserError::Page(e.to_string()))
    }

    async fn close(self: Box<Self>) -> BrowserResult<()> {
        self.page
            .close()
            .await
            .map_err(|e| BrowserError::Page(e.to_string()))
    }
}

fn resource_kind(resource_type: &ResourceType) -> ResourceKind {
    match resource_type {
        ResourceType::Document => ResourceKind::Document,
        ResourceType::Script => ResourceKind::Script,
        ResourceType::Xhr | ResourceType::Fetch => ResourceKind::Xhr,
        ResourceType::Image => ResourceKind::Image,
        ResourceType::Stylesheet => ResourceKind::Stylesheet,
        ResourceType::Font => ResourceKind::Font,
        ResourceType::Media => ResourceKind::Media,
        _ => ResourceKind::Other,
    }
}
