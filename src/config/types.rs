use serde::Deserialize;

/// Main configuration structure for Fibre-Scout
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default, rename = "provider")]
    pub providers: Vec<ProviderEntry>,
}

/// Service-wide behavior
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Enables the production-mode rules: known providers only, canonical
    /// host pinning and redacted error messages
    #[serde(default = "default_production")]
    pub production: bool,

    /// Number of pages a batch scrape keeps open at once
    #[serde(rename = "batch-concurrency", default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            production: default_production(),
            batch_concurrency: default_batch_concurrency(),
        }
    }
}

/// Headless browser configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    /// Chromium executable; auto-detected when absent
    #[serde(rename = "executable-path", default)]
    pub executable_path: Option<String>,

    /// User agent sent by every page
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    #[serde(rename = "viewport-width", default = "default_viewport_width")]
    pub viewport_width: u32,

    #[serde(rename = "viewport-height", default = "default_viewport_height")]
    pub viewport_height: u32,

    /// Upper bound for a single navigation (seconds)
    #[serde(rename = "navigation-timeout-secs", default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u64,

    /// Pause after the lazy-load scroll (milliseconds)
    #[serde(rename = "settle-delay-ms", default = "default_settle_delay")]
    pub settle_delay_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable_path: None,
            user_agent: default_user_agent(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            navigation_timeout_secs: default_navigation_timeout(),
            settle_delay_ms: default_settle_delay(),
        }
    }
}

/// AI extraction endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    /// API key; takes precedence over `api_key_env`
    #[serde(rename = "api-key", default)]
    pub api_key: Option<String>,

    /// Environment variable consulted when no key is set inline
    #[serde(rename = "api-key-env", default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(rename = "timeout-secs", default = "default_ai_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(rename = "max-output-tokens", default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// How much rendered text is embedded in the prompt
    #[serde(rename = "max-prompt-chars", default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_api_key_env(),
            endpoint: default_endpoint(),
            model: default_model(),
            timeout_secs: default_ai_timeout(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            max_prompt_chars: default_max_prompt_chars(),
        }
    }
}

impl AiConfig {
    /// Returns the configured credential, consulting the environment when
    /// none is set inline. Blank values count as absent.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}

/// Provider allowlist entry
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEntry {
    /// Display name; matched case-insensitively
    pub name: String,

    /// Canonical deals page
    pub url: String,
}

fn default_production() -> bool {
    true
}

fn default_batch_concurrency() -> usize {
    1
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string()
}

fn default_viewport_width() -> u32 {
    1366
}

fn default_viewport_height() -> u32 {
    900
}

fn default_navigation_timeout() -> u64 {
    30
}

fn default_settle_delay() -> u64 {
    1500
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_ai_timeout() -> u64 {
    15
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_output_tokens() -> u32 {
    1024
}

fn default_max_prompt_chars() -> usize {
    15_000
}
