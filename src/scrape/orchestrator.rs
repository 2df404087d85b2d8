//! Scrape orchestration
//!
//! This module ties the pieces together for one provider:
//! - Resolving the target URL (allowlist, caller URL, fallback guess)
//! - Rendering the page in a headless browser behind request interception
//! - Extracting deals from the visible text
//!
//! Every outcome is returned as a [`ScrapeResult`]; nothing is thrown past
//! [`Scraper::scrape`], and the page is closed on every exit path.

use crate::browser::{
    BrowserError, BrowserLauncher, BrowserPage, BrowserResult, BrowserSessionManager,
    ChromeLauncher, RequestInterceptor,
};
use crate::config::Config;
use crate::extract::{visible_text, ExtractedDeal, ExtractionPipeline};
use crate::scrape::providers::{fallback_url, normalize_provider, ProviderRegistry};
use crate::scrape::result::ScrapeResult;
use crate::url::{host_matches, ResolutionCache, SanitizedUrl, UrlSanitizer};
use crate::Result;
use futures::{FutureExt, StreamExt};
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

/// Most providers handled by one [`Scraper::scrape_batch`] call
pub const MAX_BATCH_PROVIDERS: usize = 5;

/// Scrolls half way down to trigger lazy-loaded content
const SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight / 2)";

pub const UNKNOWN_PROVIDER: &str = "Unknown provider";
pub const INVALID_URL: &str = "Invalid url parameter";
pub const INVALID_PROVIDER: &str = "Invalid provider parameter";
pub const NO_PRICE_DATA: &str = "No price data found";

/// Production replacement for navigation and page errors
const REDACTED_PAGE_ERROR: &str = "Failed to load page";

/// Production replacement for unexpected failures
const REDACTED_INTERNAL_ERROR: &str = "Internal error";

/// Where a scrape would navigate before the URL is checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedTarget {
    /// Caller-supplied URL
    Caller(String),
    /// Allowlisted deals page
    Canonical(String),
    /// Guessed from the provider name
    Fallback(String),
}

/// Runtime knobs for scraping
#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    /// Enforce the allowlist rules and redact error details
    pub production: bool,
    pub navigation_timeout: Duration,
    /// Pause after the scroll before capturing text
    pub settle_delay: Duration,
    /// Pages rendered at once by `scrape_batch`
    pub batch_concurrency: usize,
}

impl ScrapeSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            production: config.service.production,
            navigation_timeout: Duration::from_secs(config.browser.navigation_timeout_secs),
            settle_delay: Duration::from_millis(config.browser.settle_delay_ms),
            batch_concurrency: config.service.batch_concurrency,
        }
    }
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Scrapes broadband deals from provider websites
pub struct Scraper {
    settings: ScrapeSettings,
    registry: ProviderRegistry,
    resolver: Arc<ResolutionCache>,
    browser: Arc<BrowserSessionManager>,
    pipeline: ExtractionPipeline,
}

impl Scraper {
    pub fn new(
        settings: ScrapeSettings,
        registry: ProviderRegistry,
        resolver: Arc<ResolutionCache>,
        browser: Arc<BrowserSessionManager>,
        pipeline: ExtractionPipeline,
    ) -> Self {
        Self {
            settings,
            registry,
            resolver,
            browser,
            pipeline,
        }
    }

    /// Builds a scraper backed by chromium and the system DNS resolver
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_launcher(config, Arc::new(ChromeLauncher))
    }

    /// Builds a scraper around a specific browser backend
    pub fn with_launcher(config: &Config, launcher: Arc<dyn BrowserLauncher>) -> Result<Self> {
        let registry = ProviderRegistry::with_overrides(&config.providers)?;
        let pipeline = ExtractionPipeline::from_config(&config.ai)?;

        Ok(Self::new(
            ScrapeSettings::from_config(config),
            registry,
            Arc::new(ResolutionCache::system()),
            Arc::new(BrowserSessionManager::new(launcher, config.browser.clone())),
            pipeline,
        ))
    }

    pub fn settings(&self) -> &ScrapeSettings {
        &self.settings
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn pipeline(&self) -> &ExtractionPipeline {
        &self.pipeline
    }

    /// Works out where a scrape of `provider` would navigate, without any lookups
    ///
    /// # Resolution Steps
    ///
    /// 1. A blank provider name is rejected
    /// 2. A caller URL is taken as given (it is sanitized later)
    /// 3. A listed provider uses its canonical deals page
    /// 4. In production, an unlisted provider is rejected
    /// 5. Outside production, an unlisted provider falls back to `https://www.{slug}.co.uk`
    ///
    /// Returns the public failure message on rejection.
    pub fn plan_target(
        &self,
        provider: &str,
        raw_url: Option<&str>,
    ) -> std::result::Result<PlannedTarget, &'static str> {
        let name = normalize_provider(provider);
        if name.is_empty() {
            return Err(INVALID_PROVIDER);
        }

        if let Some(raw) = raw_url {
            return Ok(PlannedTarget::Caller(raw.to_string()));
        }

        match self.registry.canonical_url(&name) {
            Some(url) => Ok(PlannedTarget::Canonical(url.to_string())),
            None if self.settings.production => Err(UNKNOWN_PROVIDER),
            None => fallback_url(&name)
                .map(PlannedTarget::Fallback)
                .ok_or(INVALID_PROVIDER),
        }
    }

    /// Resolves the planned target to a URL that is safe to render
    ///
    /// Every candidate goes through the sanitizer. In production a caller
    /// URL must also stay on the provider's canonical host (or a subdomain)
    /// when one is listed. No request is made other than DNS lookups for the
    /// privacy check.
    pub async fn resolve_target(
        &self,
        provider: &str,
        raw_url: Option<&str>,
    ) -> std::result::Result<SanitizedUrl, &'static str> {
        let sanitizer = UrlSanitizer::new(&self.resolver);

        match self.plan_target(provider, raw_url)? {
            PlannedTarget::Caller(raw) => {
                let url = sanitizer.sanitize(&raw).await.ok_or(INVALID_URL)?;
                if self.settings.production {
                    let name = normalize_provider(provider);
                    let canonical = self.registry.canonical_url(&name);
                    if let Some(canonical_host) = canonical.and_then(|c| c.host_str()) {
                        if !host_matches(canonical_host, url.host()) {
                            tracing::debug!(
                                "Rejected {} for {}: host is not {}",
                                url,
                                name,
                                canonical_host
                            );
                            return Err(INVALID_URL);
                        }
                    }
                }
                Ok(url)
            }
            PlannedTarget::Canonical(candidate) | PlannedTarget::Fallback(candidate) => {
                sanitizer.sanitize(&candidate).await.ok_or(INVALID_PROVIDER)
            }
        }
    }

    /// Scrapes one provider
    pub async fn scrape(&self, provider: &str, raw_url: Option<&str>) -> ScrapeResult {
        let url = match self.resolve_target(provider, raw_url).await {
            Ok(url) => url,
            Err(message) => {
                tracing::info!("Rejected scrape for '{}': {}", provider, message);
                return ScrapeResult::failure(provider, message);
            }
        };

        tracing::info!("Scraping {} at {}", provider, url);

        let page = match AssertUnwindSafe(self.browser.new_page()).catch_unwind().await {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => {
                tracing::error!("Could not open a page for {}: {}", provider, e);
                return self.page_failure(provider, &e);
            }
            Err(panic) => return self.panicked(provider, panic),
        };

        let outcome = AssertUnwindSafe(self.render_and_extract(page.as_ref(), provider, &url))
            .catch_unwind()
            .await;

        match AssertUnwindSafe(page.close()).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Failed to close page for {}: {}", provider, e),
            Err(panic) => return self.panicked(provider, panic),
        }

        match outcome {
            Ok(Ok(deals)) if deals.is_empty() => {
                tracing::info!("No deals found for {}", provider);
                ScrapeResult::failure(provider, NO_PRICE_DATA)
            }
            Ok(Ok(deals)) => {
                tracing::info!("Found {} deals for {}", deals.len(), provider);
                ScrapeResult::success(provider, deals, url.into_string())
            }
            Ok(Err(e)) => {
                tracing::warn!("Scrape of {} failed: {}", provider, e);
                self.page_failure(provider, &e)
            }
            Err(panic) => self.panicked(provider, panic),
        }
    }

    /// Scrapes up to [`MAX_BATCH_PROVIDERS`] providers by name
    ///
    /// Names past the limit are ignored. Results are keyed by the name as
    /// given; a repeated name keeps one result.
    pub async fn scrape_batch(&self, providers: &[String]) -> HashMap<String, ScrapeResult> {
        if providers.len() > MAX_BATCH_PROVIDERS {
            tracing::warn!(
                "Batch of {} providers truncated to the first {}",
                providers.len(),
                MAX_BATCH_PROVIDERS
            );
        }

        futures::stream::iter(providers.iter().take(MAX_BATCH_PROVIDERS))
            .map(|name| async move { (name.clone(), self.scrape(name, None).await) })
            .buffer_unordered(self.settings.batch_concurrency.max(1))
            .collect()
            .await
    }

    /// Closes the browser if it was launched
    pub async fn shutdown(&self) -> Result<()> {
        self.browser.shutdown().await?;
        Ok(())
    }

    async fn render_and_extract(
        &self,
        page: &dyn BrowserPage,
        provider: &str,
        url: &SanitizedUrl,
    ) -> BrowserResult<Vec<ExtractedDeal>> {
        page.intercept(RequestInterceptor::new(Arc::clone(&self.resolver)))
            .await?;

        let timeout = self.settings.navigation_timeout;
        tokio::time::timeout(timeout, page.goto(url.as_str()))
            .await
            .map_err(|_| BrowserError::Timeout {
                action: format!("navigating to {}", url),
                secs: timeout.as_secs(),
            })??;

        // Best effort: a page without a body still has text to read
        if let Err(e) = page.evaluate(SCROLL_SCRIPT).await {
            tracing::debug!("Scroll failed on {}: {}", url, e);
        }
        tokio::time::sleep(self.settings.settle_delay).await;

        let html = page.content().await?;
        let text = visible_text(&html);
        tracing::debug!("Captured {} characters of text from {}", text.len(), url);

        Ok(self.pipeline.extract(&text, provider).await)
    }

    fn page_failure(&self, provider: &str, error: &BrowserError) -> ScrapeResult {
        self.redacted(provider, error.to_string(), REDACTED_PAGE_ERROR)
    }

    fn panicked(&self, provider: &str, panic: Box<dyn Any + Send>) -> ScrapeResult {
        let detail = panic_message(panic.as_ref());
        tracing::error!("Scrape of {} panicked: {}", provider, detail);
        self.redacted(provider, format!("Unexpected error: {}", detail), REDACTED_INTERNAL_ERROR)
    }

    fn redacted(&self, provider: &str, detail: String, public: &str) -> ScrapeResult {
        if self.settings.production {
            ScrapeResult::failure(provider, public)
        } else {
            ScrapeResult::failure(provider, detail)
        }
    }
}

impl std::fmt::Debug for Scraper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scraper")
            .field("settings", &self.settings)
            .field("providers", &self.registry.len())
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
