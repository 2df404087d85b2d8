//! Quick, synchronous classification of hostnames and addresses
//!
//! A `true` result always means "do not connect". A `false` result for a
//! non-literal hostname only means the name itself is not obviously internal;
//! the resolved addresses still have to be checked.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Normalizes a hostname for classification and cache keys
///
/// Trims whitespace, lowercases, strips IPv6 brackets, trailing dots and a
/// leading `www.`.
///
/// # Examples
///
/// ```
/// use fibre_scout::url::normalize_hostname;
///
/// assert_eq!(normalize_hostname(" WWW.Example.COM. "), "example.com");
/// assert_eq!(normalize_hostname("[::1]"), "::1");
/// ```
pub fn normalize_hostname(hostname: &str) -> String {
    let host = canonical_hostname(hostname);
    match host.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => host,
    }
}

/// Like [`normalize_hostname`] but keeps a leading `www.`
///
/// This is the form that gets resolved: `www.example.com` and `example.com`
/// may point at different addresses.
pub fn canonical_hostname(hostname: &str) -> String {
    let mut host = hostname.trim().to_lowercase();

    if host.starts_with('[') && host.ends_with(']') && host.len() >= 2 {
        host = host[1..host.len() - 1].to_string();
    }

    while host.ends_with('.') {
        host.pop();
    }

    host
}

/// Returns true if the hostname is obviously private without a DNS lookup
///
/// Covers `localhost` and `*.localhost`, literal IPv4/IPv6 addresses in
/// private, loopback, link-local, CGNAT, reserved or multicast ranges, and
/// malformed dotted-numeric IPv4 literals (fail-closed).
///
/// # Examples
///
/// ```
/// use fibre_scout::url::is_private_host;
///
/// assert!(is_private_host("localhost"));
/// assert!(is_private_host("10.1.2.3"));
/// assert!(is_private_host("[::ffff:127.0.0.1]"));
/// assert!(!is_private_host("example.com"));
/// ```
pub fn is_private_host(hostname: &str) -> bool {
    let host = normalize_hostname(hostname);

    if host.is_empty() {
        return true;
    }

    if matches!(host.as_str(), "localhost" | "0.0.0.0" | "127.0.0.1" | "::1")
        || host.ends_with(".localhost")
    {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return is_private_ip(&ip);
    }

    looks_like_ipv4(&host)
}

/// Returns true if the address must never be contacted
pub fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_ipv4(v4),
        IpAddr::V6(v6) => is_private_ipv6(v6),
    }
}

fn is_private_ipv4(ip: &Ipv4Addr) -> bool {
    let [a, b, _, _] = ip.octets();
    match a {
        0 | 10 | 127 => true,
        169 => b == 254,
        172 => (16..=31).contains(&b),
        192 => b == 168,
        // CGNAT 100.64.0.0/10
        100 => (64..=127).contains(&b),
        // multicast and reserved
        224..=255 => true,
        _ => false,
    }
}

fn is_private_ipv6(ip: &Ipv6Addr) -> bool {
    if let Some(mapped) = ip.to_ipv4_mapped() {
        return is_private_ipv4(&mapped);
    }

    let first = ip.segments()[0];
    ip.is_unspecified()
        || ip.is_loopback()
        || (first & 0xfe00) == 0xfc00 // fc00::/7
        || (first & 0xffc0) == 0xfe80 // fe80::/10
        || (first & 0xff00) == 0xff00 // ff00::/8
}

/// Dotted-numeric text that did not parse as a valid IPv4 address
fn looks_like_ipv4(host: &str) -> bool {
    !host.is_empty()
        && host.contains('.')
        && host.chars().all(|c| c.is_ascii_digit() || c == '.')
}
