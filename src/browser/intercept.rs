//! Per-request allow/abort decisions for a rendering page
//!
//! Every request the page issues, the main document included, is answered
//! with exactly one [`Verdict`]. Validation errors map to an abort.

use crate::url::ResolutionCache;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Resource type of an intercepted request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Document,
    Script,
    Xhr,
    Image,
    Stylesheet,
    Font,
    Media,
    Other,
}

impl ResourceKind {
    /// Resource types the text extraction never needs
    pub fn is_heavy(&self) -> bool {
        matches!(
            self,
            Self::Image | Self::Stylesheet | Self::Font | Self::Media
        )
    }
}

/// Why a request was aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// Scheme other than http, https, ws or wss
    Scheme,
    /// The URL could not be parsed or has no host
    Unparsable,
    /// The host is or resolves to a private address
    PrivateDestination,
    /// Image, stylesheet, font or media
    ResourceType,
}

/// Outcome for one intercepted request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Abort(AbortReason),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => write!(f, "allow"),
            Self::Abort(reason) => write!(f, "abort ({:?})", reason),
        }
    }
}

/// Schemes loaded without any checks: they never reach the network
const INERT_SCHEMES: &[&str] = &["data:", "blob:", "about:"];

/// Schemes that may be fetched once the destination is proven public
const NETWORK_SCHEMES: &[&str] = &["http", "https", "ws", "wss"];

/// Decides the fate of every request a page makes while rendering
#[derive(Debug, Clone)]
pub struct RequestInterceptor {
    resolver: Arc<ResolutionCache>,
}

impl RequestInterceptor {
    pub fn new(resolver: Arc<ResolutionCache>) -> Self {
        Self { resolver }
    }

    /// Returns the verdict for a request
    ///
    /// # Decision order
    ///
    /// 1. `data:`, `blob:`, `about:` → allow
    /// 2. Unparsable URL or missing host → abort
    /// 3. Scheme not in http/https/ws/wss → abort
    /// 4. Host private per [`ResolutionCache::resolve_safely`] → abort
    /// 5. Image, stylesheet, font or media → abort
    /// 6. Otherwise → allow
    pub async fn decide(&self, raw_url: &str, kind: ResourceKind) -> Verdict {
        let verdict = match self.validate(raw_url, kind).await {
            Ok(verdict) => verdict,
            Err(reason) => Verdict::Abort(reason),
        };

        if !verdict.is_allowed() {
            tracing::debug!("Intercepted {:?} {}: {}", kind, truncate(raw_url), verdict);
        }
        verdict
    }

    async fn validate(&self, raw_url: &str, kind: ResourceKind) -> Result<Verdict, AbortReason> {
        let lowered = raw_url.trim_start().to_ascii_lowercase();
        if INERT_SCHEMES.iter().any(|scheme| lowered.starts_with(scheme)) {
            return Ok(Verdict::Allow);
        }

        let url = Url::parse(raw_url).map_err(|_| AbortReason::Unparsable)?;

        if !NETWORK_SCHEMES.contains(&url.scheme()) {
            return Err(AbortReason::Scheme);
        }

        let host = url.host_str().ok_or(AbortReason::Unparsable)?;
        if self.resolver.resolve_safely(host).await {
            return Err(AbortReason::PrivateDestination);
        }

        if kind.is_heavy() {
            return Ok(Verdict::Abort(AbortReason::ResourceType));
        }

        Ok(Verdict::Allow)
    }
}

/// Keeps data: URLs and long query strings out of the logs
fn truncate(url: &str) -> &str {
    match url.char_indices().nth(120) {
        Some((idx, _)) => &url[..idx],
        None => url,
    }
}
