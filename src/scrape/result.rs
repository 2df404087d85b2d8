use crate::extract::ExtractedDeal;
use serde::{Deserialize, Serialize};

/// Value of [`ScrapeResult::source`]: every result comes from a rendered page
pub const SOURCE_HEADLESS: &str = "headless";

/// Outcome of scraping one provider
///
/// Failures are values, never errors: `success` is false and `error` holds
/// the message. `url` is only present on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub provider: String,
    pub success: bool,
    pub deals: Vec<ExtractedDeal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub source: String,
    pub rendered: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ScrapeResult {
    pub fn success(provider: &str, deals: Vec<ExtractedDeal>, url: String) -> Self {
        Self {
            provider: provider.to_string(),
            success: true,
            deals,
            error: None,
            source: SOURCE_HEADLESS.to_string(),
            rendered: true,
            url: Some(url),
        }
    }

    pub fn failure(provider: &str, error: impl Into<String>) -> Self {
        Self {
            provider: provider.to_string(),
            success: false,
            deals: Vec::new(),
            error: Some(error.into()),
            source: SOURCE_HEADLESS.to_string(),
            rendered: true,
            url: None,
        }
    }
}
