//! AI-assisted deal extraction
//!
//! This module handles the language-model path of extraction:
//! - Building a bounded instruction prompt from rendered page text
//! - Calling a Gemini-style `generateContent` endpoint over HTTPS
//! - Tolerant parsing of the model's reply into typed deals
//!
//! Every failure is reported as an [`AiError`]; the pipeline turns all of
//! them into a pattern-based fallback.

use crate::config::AiConfig;
use crate::extract::pattern::deal_label;
use crate::extract::{format_speed, ExtractedDeal, MAX_DEALS};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use thiserror::Error;

/// Errors from the AI extraction path
#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI endpoint returned HTTP {status}")]
    Status { status: u16 },

    #[error("AI request timed out after {0}s")]
    Timeout(u64),

    #[error("AI transport error: {0}")]
    Transport(String),

    #[error("AI response contained no text")]
    EmptyResponse,

    #[error("AI output could not be parsed: {0}")]
    Parse(String),
}

static NUMBER_WITH_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?P<value>\d+(?:\.\d+)?)\s*(?P<unit>gbps|gb/s|gb|mbps|mb/s|mb)?").unwrap()
});

static PRICE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?P<value>\d+(?:\.\d+)?)").unwrap());

/// A text-completion backend
#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// Sends `prompt` and returns the model's raw text reply
    async fn complete(&self, prompt: &str) -> Result<String, AiError>;
}

/// Builds the HTTP client used for AI calls
///
/// Redirects follow reqwest's default policy; the endpoint is operator
/// configuration, not caller input.
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!("fibre-scout/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(5))
        .gzip(true)
        .brotli(true)
        .build()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [RequestContent<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Client for the Gemini `generateContent` API
pub struct GeminiClient {
    client: Client,
    url: String,
    api_key: String,
    temperature: f32,
    max_output_tokens: u32,
    timeout_secs: u64,
}

impl GeminiClient {
    /// Creates a client for the configured endpoint and model
    pub fn new(config: &AiConfig, api_key: String) -> Result<Self, AiError> {
        let client = build_http_client(Duration::from_secs(config.timeout_secs))
            .map_err(|e| AiError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: format!(
                "{}/v1beta/models/{}:generateContent",
                config.endpoint.trim_end_matches('/'),
                config.model
            ),
            api_key,
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            timeout_secs: config.timeout_secs,
        })
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("url", &self.url)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TextCompletion for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, AiError> {
        let body = GenerateRequest {
            contents: [RequestContent {
                parts: [RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        };

        let response = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AiError::Timeout(self.timeout_secs)
                } else {
                    AiError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AiError::Status {
                status: status.as_u16(),
            });
        }

        let reply: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AiError::Parse(e.to_string()))?;

        let text: String = reply
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AiError::EmptyResponse);
        }
        Ok(text)
    }
}

/// Builds the extraction prompt, embedding at most `max_chars` characters of text
pub fn build_prompt(provider: &str, text: &str, max_chars: usize) -> String {
    let excerpt: String = text.chars().take(max_chars).collect();

    format!(
        r#"You are extracting UK residential broadband deals advertised by "{provider}" from the visible text of their website.

Rules:
- Only include residential broadband packages. Ignore business, mobile, TV-only and add-on offers.
- Pair each advertised download speed with the monthly price of that same package. Never combine one package's speed with another package's price.
- Give speeds in Mbps. Convert Gbps figures to Mbps by multiplying by 1000.
- Give prices as the monthly cost in pounds, as a number without the currency symbol.
- Include at most {max_deals} deals.
- Respond with strict JSON only, exactly in this shape and with no other text:
{{"deals":[{{"name":"Full Fibre 500","speed_mbps":500,"price":34.99,"contract":"24 months"}}]}}

Website text:
"""
{excerpt}
""""#,
        provider = provider,
        max_deals = MAX_DEALS,
        excerpt = excerpt,
    )
}

/// Runs prompts through a [`TextCompletion`] backend under a hard timeout
pub struct AiExtractor {
    backend: Arc<dyn TextCompletion>,
    timeout: Duration,
    max_prompt_chars: usize,
}

impl AiExtractor {
    pub fn new(backend: Arc<dyn TextCompletion>, timeout: Duration, max_prompt_chars: usize) -> Self {
        Self {
            backend,
            timeout,
            max_prompt_chars,
        }
    }

    /// Creates a Gemini-backed extractor, or `None` when no API key is configured
    pub fn from_config(config: &AiConfig) -> Result<Option<Self>, AiError> {
        let Some(api_key) = config.resolve_api_key() else {
            return Ok(None);
        };

        let client = GeminiClient::new(config, api_key)?;
        Ok(Some(Self::new(
            Arc::new(client),
            Duration::from_secs(config.timeout_secs),
            config.max_prompt_chars,
        )))
    }

    /// Asks the model for deals found in `text`
    pub async fn extract(&self, provider: &str, text: &str) -> Result<Vec<ExtractedDeal>, AiError> {
        let prompt = build_prompt(provider, text, self.max_prompt_chars);

        let reply = tokio::time::timeout(self.timeout, self.backend.complete(&prompt))
            .await
            .map_err(|_| AiError::Timeout(self.timeout.as_secs()))??;

        parse_ai_deals(&reply)
    }
}

/// Parses a model reply into at most five deals
///
/// # Parsing Steps
///
/// 1. Strip Markdown code fences
/// 2. Parse the reply directly as JSON
/// 3. Otherwise parse the largest balanced `{...}` substring that mentions `"deals"`
/// 4. Normalize each entry; entries without a usable speed or price are dropped
pub fn parse_ai_deals(reply: &str) -> Result<Vec<ExtractedDeal>, AiError> {
    let cleaned = strip_code_fences(reply);

    let value = match serde_json::from_str::<Value>(cleaned) {
        Ok(value) if value.get("deals").is_some() => value,
        _ => {
            let candidate = largest_deals_object(cleaned)
                .ok_or_else(|| AiError::Parse("no JSON object with a deals key".to_string()))?;
            serde_json::from_str(candidate).map_err(|e| AiError::Parse(e.to_string()))?
        }
    };

    let entries = value
        .get("deals")
        .and_then(Value::as_array)
        .ok_or_else(|| AiError::Parse("deals is not an array".to_string()))?;

    Ok(entries
        .iter()
        .filter_map(normalize_entry)
        .take(MAX_DEALS)
        .collect())
}

fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string (e.g. "json") on the opening fence line
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Finds the longest balanced-brace substring containing `"deals"`
///
/// Braces inside JSON string literals are ignored.
fn largest_deals_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut best: Option<&str> = None;

    for (start, _) in text.match_indices('{') {
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        for (offset, &byte) in bytes[start..].iter().enumerate() {
            if in_string {
                match byte {
                    _ if escaped => escaped = false,
                    b'\\' => escaped = true,
                    b'"' => in_string = false,
                    _ => {}
                }
                continue;
            }

            match byte {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        let candidate = &text[start..=start + offset];
                        if candidate.contains("\"deals\"")
                            && best.map_or(true, |b| candidate.len() > b.len())
                        {
                            best = Some(candidate);
                        }
                        break;
                    }
                }
                _ => {}
            }
        }
    }

    best
}

fn normalize_entry(entry: &Value) -> Option<ExtractedDeal> {
    let speed = entry
        .get("speed_mbps")
        .or_else(|| entry.get("speed"))
        .and_then(speed_mbps)?;
    let price = entry.get("price").and_then(price_gbp)?;

    let name = entry
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| deal_label(speed));

    let contract = match entry.get("contract") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => n.as_u64().map(|months| format!("{} months", months)),
        _ => None,
    };

    Some(ExtractedDeal {
        name,
        speed: format_speed(speed),
        price: format!("{:.2}", price),
        contract,
    })
}

fn speed_mbps(value: &Value) -> Option<u32> {
    let mbps = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let caps = NUMBER_WITH_UNIT.captures(s)?;
            let number: f64 = caps.name("value")?.as_str().parse().ok()?;
            let gigabit = caps
                .name("unit")
                .map(|u| u.as_str().to_ascii_lowercase().starts_with('g'))
                .unwrap_or(false);
            if gigabit {
                number * 1000.0
            } else {
                number
            }
        }
        _ => return None,
    };

    (mbps.is_finite() && mbps >= 1.0).then(|| mbps.round() as u32)
}

fn price_gbp(value: &Value) -> Option<f64> {
    let price = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => PRICE_NUMBER
            .captures(s)?
            .name("value")?
            .as_str()
            .parse()
            .ok()?,
        _ => return None,
    };

    (price.is_finite() && price > 0.0).then_some(price)
}
