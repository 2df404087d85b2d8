//! Headless browser module for Fibre-Scout
//!
//! This module owns the browser lifecycle:
//! - One lazily-launched browser process per service, behind a
//!   single-initialization guard
//! - One page per scrape, configured with a fixed viewport and user agent
//! - Request interception that keeps rendering away from private networks
//!
//! The runtime itself sits behind the [`BrowserLauncher`], [`BrowserSession`]
//! and [`BrowserPage`] traits; [`ChromeLauncher`] is the chromium backend.

mod chrome;
mod intercept;
mod session;

pub use chrome::ChromeLauncher;
pub use intercept::{AbortReason, RequestInterceptor, ResourceKind, Verdict};
pub use session::BrowserSessionManager;

use crate::config::BrowserConfig;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by the browser runtime
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Page error: {0}")]
    Page(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Timed out after {secs}s: {action}")]
    Timeout { action: String, secs: u64 },

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("Browser session is closed")]
    Closed,
}

/// Result type for browser operations
pub type BrowserResult<T> = Result<T, BrowserError>;

/// Fixed page dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl From<&BrowserConfig> for Viewport {
    fn from(config: &BrowserConfig) -> Self {
        Self {
            width: config.viewport_width,
            height: config.viewport_height,
        }
    }
}

/// Starts browser processes
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launches a new browser process
    async fn launch(&self, config: &BrowserConfig) -> BrowserResult<Arc<dyn BrowserSession>>;
}

/// A running browser process
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Opens a fresh blank page
    async fn new_page(&self) -> BrowserResult<Box<dyn BrowserPage>>;

    /// Terminates the process; later calls to `new_page` fail
    async fn close(&self) -> BrowserResult<()>;
}

/// A single browser tab, exclusively owned by one scrape
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Applies viewport and user agent
    async fn configure(&self, viewport: Viewport, user_agent: &str) -> BrowserResult<()>;

    /// Routes every subsequent request through `interceptor`
    async fn intercept(&self, interceptor: RequestInterceptor) -> BrowserResult<()>;

    /// Navigates and waits for the load event
    async fn goto(&self, url: &str) -> BrowserResult<()>;

    /// Evaluates a script expression, returning its JSON value
    /// (`null` for `undefined`)
    async fn evaluate(&self, script: &str) -> BrowserResult<serde_json::Value>;

    /// Serialized HTML of the current document
    async fn content(&self) -> BrowserResult<String>;

    /// Closes the tab
    async fn close(self: Box<Self>) -> BrowserResult<()>;
}
