//! Extraction module for Fibre-Scout
//!
//! This module turns rendered page text into broadband deals:
//! - Visible-text capture from the rendered document ([`visible_text`])
//! - An optional AI path backed by a text-completion endpoint
//! - A deterministic pattern fallback that is always available
//!
//! [`ExtractionPipeline::extract`] never fails. Any AI problem (no key,
//! bad status, timeout, unparsable reply, zero usable deals) degrades to
//! the pattern fallback.

mod ai;
mod pattern;
mod text;

pub use ai::{
    build_prompt, parse_ai_deals, AiError, AiExtractor, GeminiClient, TextCompletion,
};
pub use pattern::{deal_label, extract_with_patterns, PRICE_RANGE, SPEED_RANGE};
pub use text::visible_text;

use crate::config::AiConfig;
use serde::{Deserialize, Serialize};

/// Maximum number of deals reported per provider
pub const MAX_DEALS: usize = 5;

/// A broadband deal found on a provider page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDeal {
    /// Package name
    pub name: String,

    /// Download speed, formatted as `"N Mbps"`
    pub speed: String,

    /// Monthly price in pounds with two decimals
    pub price: String,

    /// Minimum term, e.g. `"24 months"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,
}

/// Formats a speed for [`ExtractedDeal::speed`]
pub fn format_speed(mbps: u32) -> String {
    format!("{} Mbps", mbps)
}

/// AI extraction with a pattern fallback
pub struct ExtractionPipeline {
    ai: Option<AiExtractor>,
}

impl ExtractionPipeline {
    pub fn new(ai: Option<AiExtractor>) -> Self {
        Self { ai }
    }

    /// A pipeline that only runs the pattern fallback
    pub fn regex_only() -> Self {
        Self { ai: None }
    }

    /// Builds the pipeline, enabling the AI path when an API key is available
    pub fn from_config(config: &AiConfig) -> Result<Self, AiError> {
        let ai = AiExtractor::from_config(config)?;
        if ai.is_none() {
            tracing::info!(
                "No AI key configured ({} unset); using pattern extraction only",
                config.api_key_env
            );
        }
        Ok(Self { ai })
    }

    pub fn is_ai_enabled(&self) -> bool {
        self.ai.is_some()
    }

    /// Extracts deals from rendered text
    pub async fn extract(&self, text: &str, provider: &str) -> Vec<ExtractedDeal> {
        if let Some(ai) = &self.ai {
            match ai.extract(provider, text).await {
                Ok(deals) if !deals.is_empty() => {
                    tracing::debug!("AI extracted {} deals for {}", deals.len(), provider);
                    return deals;
                }
                Ok(_) => {
                    tracing::warn!("AI found no deals for {}; falling back to patterns", provider);
                }
                Err(e) => {
                    tracing::warn!("AI extraction failed for {}: {}; falling back to patterns", provider, e);
                }
            }
        }

        let deals = extract_with_patterns(text);
        tracing::debug!("Pattern extraction found {} deals for {}", deals.len(), provider);
        deals
    }
}

impl std::fmt::Debug for ExtractionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionPipeline")
            .field("ai_enabled", &self.is_ai_enabled())
            .finish()
    }
}
