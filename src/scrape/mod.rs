//! Scrape module for Fibre-Scout
//!
//! This module exposes the two entry points callers use:
//! - [`Scraper::scrape`] for one provider, optionally with a caller URL
//! - [`Scraper::scrape_batch`] for up to [`MAX_BATCH_PROVIDERS`] providers
//!
//! Provider names are matched against an allowlist of canonical deals pages
//! ([`ProviderRegistry`]).

mod orchestrator;
mod providers;
mod result;

pub use orchestrator::{
    PlannedTarget, ScrapeSettings, Scraper, INVALID_PROVIDER, INVALID_URL, MAX_BATCH_PROVIDERS,
    NO_PRICE_DATA, UNKNOWN_PROVIDER,
};
pub use providers::{fallback_url, normalize_provider, slugify, ProviderRegistry};
pub use result::{ScrapeResult, SOURCE_HEADLESS};
