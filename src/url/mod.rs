//! URL safety module for Fibre-Scout
//!
//! This module decides whether a destination may be contacted at all:
//! quick hostname/IP classification, DNS-backed privacy checks with
//! per-host request coalescing, sanitization of caller-supplied URLs, and
//! canonical-host matching for known providers.

mod matcher;
mod privacy;
mod resolver;
mod sanitize;

// Re-export main functions
pub use matcher::host_matches;
pub use privacy::{canonical_hostname, is_private_host, is_private_ip, normalize_hostname};
pub use resolver::{ResolutionCache, Resolver, SystemResolver};
pub use sanitize::{SanitizedUrl, UrlSanitizer, MAX_URL_LENGTH};
