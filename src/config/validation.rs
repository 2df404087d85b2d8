use crate::config::types::{AiConfig, BrowserConfig, Config, ProviderEntry, ServiceConfig};
use crate::scrape::MAX_BATCH_PROVIDERS;
use crate::{ConfigError, ConfigResult};
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_service_config(&config.service)?;
    validate_browser_config(&config.browser)?;
    validate_ai_config(&config.ai)?;
    validate_providers(&config.providers)?;
    Ok(())
}

fn validate_service_config(config: &ServiceConfig) -> ConfigResult<()> {
    if config.batch_concurrency < 1 || config.batch_concurrency > MAX_BATCH_PROVIDERS {
        return Err(ConfigError::Validation(format!(
            "batch_concurrency must be between 1 and {}, got {}",
            MAX_BATCH_PROVIDERS, config.batch_concurrency
        )));
    }
    Ok(())
}

fn validate_browser_config(config: &BrowserConfig) -> ConfigResult<()> {
    if let Some(path) = &config.executable_path {
        if path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "executable_path cannot be empty when set".to_string(),
            ));
        }
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.user_agent.chars().any(|c| c.is_control()) {
        return Err(ConfigError::Validation(
            "user_agent cannot contain control characters".to_string(),
        ));
    }

    for (name, value) in [
        ("viewport_width", config.viewport_width),
        ("viewport_height", config.viewport_height),
    ] {
        if !(320..=4096).contains(&value) {
            return Err(ConfigError::Validation(format!(
                "{} must be between 320 and 4096, got {}",
                name, value
            )));
        }
    }

    validate_timeout("navigation_timeout_secs", config.navigation_timeout_secs)?;

    if config.settle_delay_ms > 10_000 {
        return Err(ConfigError::Validation(format!(
            "settle_delay_ms must be <= 10000ms, got {}ms",
            config.settle_delay_ms
        )));
    }

    Ok(())
}

fn validate_ai_config(config: &AiConfig) -> ConfigResult<()> {
    let endpoint = Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid ai endpoint: {}", e)))?;
    if endpoint.scheme() != "https" && endpoint.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "ai endpoint must use http or https, got '{}'",
            endpoint.scheme()
        )));
    }

    if config.model.trim().is_empty() {
        return Err(ConfigError::Validation("ai model cannot be empty".to_string()));
    }

    validate_timeout("ai timeout_secs", config.timeout_secs)?;

    if !(0.0..=2.0).contains(&config.temperature) {
        return Err(ConfigError::Validation(format!(
            "temperature must be between 0.0 and 2.0, got {}",
            config.temperature
        )));
    }

    if config.max_output_tokens == 0 {
        return Err(ConfigError::Validation(
            "max_output_tokens must be >= 1".to_string(),
        ));
    }

    if !(1_000..=100_000).contains(&config.max_prompt_chars) {
        return Err(ConfigError::Validation(format!(
            "max_prompt_chars must be between 1000 and 100000, got {}",
            config.max_prompt_chars
        )));
    }

    Ok(())
}

/// Validates provider allowlist entries
fn validate_providers(providers: &[ProviderEntry]) -> ConfigResult<()> {
    for entry in providers {
        if entry.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "provider name cannot be empty".to_string(),
            ));
        }

        let url = Url::parse(&entry.url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid provider URL '{}': {}", entry.url, e))
        })?;

        if url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Provider URL '{}' must use HTTPS scheme",
                entry.url
            )));
        }

        if url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(format!(
                "Provider URL '{}' has no host",
                entry.url
            )));
        }
    }

    Ok(())
}

fn validate_timeout(name: &str, secs: u64) -> ConfigResult<()> {
    if !(1..=120).contains(&secs) {
        return Err(ConfigError::Validation(format!(
            "{} must be between 1 and 120 seconds, got {}",
            name, secs
        )));
    }
    Ok(())
}
