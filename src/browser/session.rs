//! Browser session lifecycle
//!
//! The browser is launched on first use. Concurrent first callers all await
//! the same launch; a failed launch leaves the slot empty so the next call
//! retries.

use crate::browser::{BrowserLauncher, BrowserPage, BrowserResult, BrowserSession, Viewport};
use crate::config::BrowserConfig;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Owns the single browser process and hands out configured pages
pub struct BrowserSessionManager {
    launcher: Arc<dyn BrowserLauncher>,
    config: BrowserConfig,
    session: OnceCell<Arc<dyn BrowserSession>>,
}

impl BrowserSessionManager {
    /// Creates a manager; nothing is launched until the first page request
    pub fn new(launcher: Arc<dyn BrowserLauncher>, config: BrowserConfig) -> Self {
        Self {
            launcher,
            config,
            session: OnceCell::new(),
        }
    }

    /// Returns the browser session, launching it on first use
    pub async fn session(&self) -> BrowserResult<Arc<dyn BrowserSession>> {
        let session = self
            .session
            .get_or_try_init(|| async {
                tracing::info!(
                    "Launching headless browser ({})",
                    self.config
                        .executable_path
                        .as_deref()
                        .unwrap_or("auto-detected executable")
                );
                self.launcher.launch(&self.config).await
            })
            .await?;
        Ok(Arc::clone(session))
    }

    /// Opens a new page with the configured viewport and user agent
    ///
    /// If configuration fails the page is closed before the error is
    /// returned, so the caller only ever owns fully configured pages.
    pub async fn new_page(&self) -> BrowserResult<Box<dyn BrowserPage>> {
        let session = self.session().await?;
        let page = session.new_page().await?;

        if let Err(e) = page
            .configure(Viewport::from(&self.config), &self.config.user_agent)
            .await
        {
            if let Err(close_err) = page.close().await {
                tracing::warn!("Failed to close unconfigured page: {}", close_err);
            }
            return Err(e);
        }

        Ok(page)
    }

    /// True once a browser process has been launched
    pub fn is_launched(&self) -> bool {
        self.session.initialized()
    }

    /// Closes the browser process if one was launched
    pub async fn shutdown(&self) -> BrowserResult<()> {
        match self.session.get() {
            Some(session) => {
                tracing::info!("Shutting down headless browser");
                session.close().await
            }
            None => Ok(()),
        }
    }
}
