//! Fibre-Scout: SSRF-safe broadband deal scraping
//!
//! This crate renders UK broadband provider pages in a headless browser and
//! extracts residential deals (speed, monthly price, contract length) from
//! the visible text, using an optional AI model with a deterministic pattern
//! fallback. Every navigation and subresource request is checked against
//! private, loopback, link-local and reserved networks before it is made.

pub mod browser;
pub mod config;
pub mod extract;
pub mod scrape;
pub mod url;

use thiserror::Error;

/// Main error type for Fibre-Scout operations
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Browser error: {0}")]
    Browser(#[from] browser::BrowserError),

    #[error("AI error: {0}")]
    Ai(#[from] extract::AiError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Reasons a caller-supplied URL is rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("URL contains credentials")]
    Credentials,

    #[error("Non-default port: {0}")]
    Port(u16),

    #[error("URL is {0} characters long")]
    TooLong(usize),

    #[error("URL contains control characters")]
    ControlCharacters,

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Destination is private: {0}")]
    PrivateDestination(String),
}

/// Result type alias for Fibre-Scout operations
pub type Result<T> = std::result::Result<T, ScoutError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use extract::{ExtractedDeal, ExtractionPipeline};
pub use scrape::{ScrapeResult, Scraper};
pub use url::{ResolutionCache, SanitizedUrl, UrlSanitizer};
