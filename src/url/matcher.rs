use crate::url::privacy::canonical_hostname;

/// Checks if a host is the canonical host or one of its subdomains
///
/// Both sides are normalized first (case, brackets, trailing dots). A leading
/// `www.` on the canonical host is ignored, so a provider registered as
/// `www.example.com` also accepts `example.com` and `shop.example.com`.
/// This pins to the registrable site rather than to strict subdomains of
/// the listed host, which would accept only `*.www.example.com`.
///
/// # Arguments
///
/// * `canonical` - The provider's registered host
/// * `candidate` - The host of a caller-supplied URL
///
/// # Examples
///
/// ```
/// use fibre_scout::url::host_matches;
///
/// assert!(host_matches("www.example.com", "example.com"));
/// assert!(host_matches("www.example.com", "deals.example.com"));
/// assert!(host_matches("example.com", "api.v2.example.com"));
/// assert!(!host_matches("example.com", "example.com.evil.net"));
/// assert!(!host_matches("example.com", "notexample.com"));
/// ```
pub fn host_matches(canonical: &str, candidate: &str) -> bool {
    let canonical = canonical_hostname(canonical);
    let base = canonical.strip_prefix("www.").unwrap_or(&canonical);
    let candidate = canonical_hostname(candidate);

    if base.is_empty() || candidate.is_empty() {
        return false;
    }

    candidate == base || candidate.ends_with(&format!(".{}", base))
}
