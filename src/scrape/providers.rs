//! Provider allowlist
//!
//! Known providers map to a canonical deals page. Lookups use the
//! normalized provider name (trimmed, lowercase).

use crate::config::ProviderEntry;
use crate::ConfigError;
use std::collections::BTreeMap;
use url::Url;

/// Built-in canonical deals pages
const BUILTIN_PROVIDERS: &[(&str, &str)] = &[
    ("bt", "https://www.bt.com/broadband/deals"),
    ("sky", "https://www.sky.com/broadband"),
    ("virgin media", "https://www.virginmedia.com/broadband"),
    ("talktalk", "https://www.talktalk.co.uk/broadband"),
    ("vodafone", "https://www.vodafone.co.uk/broadband"),
    ("ee", "https://ee.co.uk/broadband"),
    ("plusnet", "https://www.plus.net/broadband/"),
    ("hyperoptic", "https://www.hyperoptic.com/broadband/"),
    ("community fibre", "https://communityfibre.co.uk/packages"),
    ("now broadband", "https://www.nowtv.com/broadband"),
    ("shell energy", "https://www.shellenergy.co.uk/broadband"),
    ("zen", "https://www.zen.co.uk/broadband"),
];

/// Normalizes a provider name for lookups
pub fn normalize_provider(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Reduces a provider name to lowercase ASCII letters and digits
///
/// # Examples
///
/// ```
/// use fibre_scout::scrape::slugify;
///
/// assert_eq!(slugify("Virgin Media"), "virginmedia");
/// assert_eq!(slugify("  Shell-Energy! "), "shellenergy");
/// ```
pub fn slugify(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Guesses a provider homepage as `https://www.{slug}.co.uk`
pub fn fallback_url(name: &str) -> Option<String> {
    let slug = slugify(name);
    if slug.is_empty() {
        None
    } else {
        Some(format!("https://www.{}.co.uk", slug))
    }
}

/// Known providers and their canonical URLs
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    urls: BTreeMap<String, Url>,
}

impl ProviderRegistry {
    /// The built-in allowlist
    pub fn builtin() -> Self {
        let urls = BUILTIN_PROVIDERS
            .iter()
            .filter_map(|(name, url)| Some((name.to_string(), Url::parse(url).ok()?)))
            .collect();
        Self { urls }
    }

    /// The built-in allowlist with configured entries merged on top
    pub fn with_overrides(entries: &[ProviderEntry]) -> Result<Self, ConfigError> {
        let mut registry = Self::builtin();
        for entry in entries {
            registry.insert(&entry.name, &entry.url)?;
        }
        Ok(registry)
    }

    /// Adds or replaces a provider
    pub fn insert(&mut self, name: &str, url: &str) -> Result<(), ConfigError> {
        let parsed = Url::parse(url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", url, e)))?;
        self.urls.insert(normalize_provider(name), parsed);
        Ok(())
    }

    /// Canonical URL for a provider name, if it is on the allowlist
    pub fn canonical_url(&self, name: &str) -> Option<&Url> {
        self.urls.get(&normalize_provider(name))
    }

    /// Normalized names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.urls.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Url)> {
        self.urls.iter().map(|(name, url)| (name.as_str(), url))
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
