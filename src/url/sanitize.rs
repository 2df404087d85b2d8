use crate::url::resolver::ResolutionCache;
use crate::{UrlError, UrlResult};
use std::fmt;
use url::Url;

/// Longest caller-supplied URL accepted
pub const MAX_URL_LENGTH: usize = 2048;

/// An absolute http(s) URL that passed every sanitizer rule
///
/// No credentials, default port only, no fragment, and a destination that
/// did not resolve to a private network. Only [`UrlSanitizer`] constructs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedUrl {
    url: Url,
}

impl SanitizedUrl {
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Lowercase host of the URL
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn into_string(self) -> String {
        self.url.into()
    }
}

impl fmt::Display for SanitizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Validates and canonicalizes untrusted URLs
#[derive(Debug, Clone, Copy)]
pub struct UrlSanitizer<'a> {
    resolver: &'a ResolutionCache,
}

impl<'a> UrlSanitizer<'a> {
    pub fn new(resolver: &'a ResolutionCache) -> Self {
        Self { resolver }
    }

    /// Sanitizes a URL, returning `None` on any rejection
    ///
    /// The rejection reason is logged but never surfaced, so a private
    /// destination is indistinguishable from a malformed URL to the caller.
    pub async fn sanitize(&self, raw: &str) -> Option<SanitizedUrl> {
        match self.check(raw).await {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::debug!("Rejected URL: {}", e);
                None
            }
        }
    }

    /// Sanitizes a URL, reporting which rule rejected it
    ///
    /// # Rules
    ///
    /// 1. Raw length must be at most 2048 characters
    /// 2. No control characters (`\n`, `\r`, ...) anywhere in the raw string
    /// 3. Must parse as an absolute URL with `http` or `https` scheme
    /// 4. No userinfo (username or password)
    /// 5. Port, when explicit, must be 80 or 443
    /// 6. Host must not be, or resolve to, a private address
    ///
    /// The fragment is stripped from the returned URL.
    pub async fn check(&self, raw: &str) -> UrlResult<SanitizedUrl> {
        let mut url = parse_untrusted(raw)?;

        let host = url.host_str().ok_or(UrlError::MissingHost)?.to_string();
        if self.resolver.resolve_safely(&host).await {
            return Err(UrlError::PrivateDestination(host));
        }

        url.set_fragment(None);
        Ok(SanitizedUrl { url })
    }
}

/// Applies every rule that needs no network access
fn parse_untrusted(raw: &str) -> UrlResult<Url> {
    if raw.len() > MAX_URL_LENGTH {
        return Err(UrlError::TooLong(raw.len()));
    }

    // The url crate silently drops tabs and newlines, so check the raw input
    if raw.chars().any(|c| c.is_control()) {
        return Err(UrlError::ControlCharacters);
    }

    let url = Url::parse(raw.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if !url.username().is_empty() || url.password().is_some() {
        return Err(UrlError::Credentials);
    }

    // `port()` is None when the port is the scheme default
    if let Some(port) = url.port() {
        if port != 80 && port != 443 {
            return Err(UrlError::Port(port));
        }
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlError::MissingHost),
    }
}
