//! DNS-backed privacy checks with per-hostname request coalescing
//!
//! Concurrent checks for the same hostname share one in-flight lookup. The
//! lookup runs on its own task, so a caller timing out never cancels it; the
//! entry leaves the in-flight map as soon as the lookup settles.

use crate::url::privacy::{canonical_hostname, is_private_host, is_private_ip};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::io;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

/// Hostname resolution backend
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolves every address for `hostname`
    async fn lookup(&self, hostname: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the operating system (`getaddrinfo` via tokio)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn lookup(&self, hostname: &str) -> io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((hostname, 0)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

type PendingCheck = Shared<BoxFuture<'static, bool>>;

/// Coalesces concurrent DNS privacy checks per canonical hostname
pub struct ResolutionCache {
    resolver: Arc<dyn Resolver>,
    in_flight: Arc<Mutex<HashMap<String, PendingCheck>>>,
}

impl ResolutionCache {
    /// Creates a cache on top of the given resolver
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self {
            resolver,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Creates a cache using the system resolver
    pub fn system() -> Self {
        Self::new(Arc::new(SystemResolver))
    }

    /// Returns true if `hostname` is, or resolves to, a private destination
    ///
    /// Literal addresses and obviously-internal names are answered without a
    /// lookup. Everything else is resolved; a failed lookup, an empty answer,
    /// or any private address in the answer counts as private.
    pub async fn resolve_safely(&self, hostname: &str) -> bool {
        let host = canonical_hostname(hostname);

        if is_private_host(&host) {
            return true;
        }

        // Public literal address: nothing to resolve
        if host.parse::<IpAddr>().is_ok() {
            return false;
        }

        self.pending_check(host).await
    }

    /// Number of lookups currently in flight
    pub fn in_flight(&self) -> usize {
        self.lock_in_flight().len()
    }

    fn pending_check(&self, host: String) -> PendingCheck {
        let mut in_flight = self.lock_in_flight();

        if let Some(pending) = in_flight.get(&host) {
            tracing::trace!("Joining in-flight lookup for {}", host);
            return pending.clone();
        }

        let resolver = Arc::clone(&self.resolver);
        let registry = Arc::clone(&self.in_flight);
        let key = host.clone();
        let lookup = tokio::spawn(async move {
            let private = match resolver.lookup(&key).await {
                Ok(addrs) if addrs.is_empty() => {
                    tracing::debug!("No addresses for {}, treating as private", key);
                    true
                }
                Ok(addrs) => addrs.iter().any(is_private_ip),
                Err(e) => {
                    tracing::debug!("Lookup failed for {}: {}", key, e);
                    true
                }
            };

            if let Ok(mut map) = registry.lock() {
                map.remove(&key);
            }
            private
        });

        // A panicked or cancelled lookup task fails closed
        let pending = async move { lookup.await.unwrap_or(true) }.boxed().shared();
        in_flight.insert(host, pending.clone());
        pending
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, HashMap<String, PendingCheck>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for ResolutionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionCache")
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
