//! Tenant resolution by domain or slug.
//!
//! DESIGN
//! ======
//! A tenant's custom domain maps to its brand via the tenant directory
//! (`/tenants/by-domain/:domain`, `/tenants/by-slug/:slug`). Hosts under a
//! platform domain are the shared multi-tenant shell and are never looked
//! up.
//!
//! Answers are cached per lookup key for `ttl` (300 s by default). Both
//! "found" and "not found" are cached; a lookup that never got a response
//! is not, so the next request tries again. The cache is advisory: a stale
//! brand for up to one window is acceptable. It holds at most
//! `MAX_CACHED_LOOKUPS` entries; the oldest answer is evicted first.
//!
//! Concurrent misses for one key share a single directory call through a
//! `Shared` future kept in `in_flight`. The future stores its answer and
//! then removes itself, the same way the request client coalesces refreshes.
//!
//! Hosts and slugs are caller-controlled (`X-Forwarded-Host`, a path
//! segment). Hosts outside `[a-z0-9.-]` normalize to empty and are never
//! looked up; slugs are percent-encoded as a single path segment.
//!
//! ERROR HANDLING
//! ==============
//! Lookups never fail. Anything other than a decodable 2xx degrades to
//! `None` and the caller falls back to platform branding.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::transport::HttpTransport;
use crate::api::types::{ApiRequest, Method};

pub const DEFAULT_TENANT_CACHE_TTL_SECS: u64 = 300;
pub const PLATFORM_BRAND_NAME: &str = "Chauffeur Portal";
pub const MAX_CACHED_LOOKUPS: usize = 1024;

// =============================================================================
// TYPES
// =============================================================================

/// Tenant record from the tenant directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantBrand {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub logo_url: Option<String>,
    pub domain: Option<String>,
    #[serde(default)]
    pub primary_color: Option<String>,
}

/// What a page renders: a tenant's brand, or the platform default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Branding {
    pub name: String,
    pub logo_url: Option<String>,
    pub primary_color: Option<String>,
    pub tenant: Option<TenantBrand>,
}

impl Branding {
    #[must_use]
    pub fn platform_default() -> Self {
        Self { name: PLATFORM_BRAND_NAME.to_owned(), logo_url: None, primary_color: None, tenant: None }
    }

    #[must_use]
    pub fn for_tenant(brand: Option<TenantBrand>) -> Self {
        match brand {
            Some(brand) => Self {
                name: brand.name.clone(),
                logo_url: brand.logo_url.clone(),
                primary_color: brand.primary_color.clone(),
                tenant: Some(brand),
            },
            None => Self::platform_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LookupKey {
    Domain(String),
    Slug(String),
}

impl LookupKey {
    /// Directory URL under `base_url`, with the domain or slug as one encoded
    /// path segment.
    fn url(&self, base_url: &str) -> Option<Url> {
        let (kind, value) = match self {
            Self::Domain(domain) => ("by-domain", domain),
            Self::Slug(slug) => ("by-slug", slug),
        };
        let mut url = Url::parse(base_url).ok()?;
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .extend(["tenants", kind, value.as_str()]);
        Some(url)
    }
}

struct CacheEntry {
    fetched_at: Instant,
    brand: Option<TenantBrand>,
}

type Cache = Arc<Mutex<HashMap<LookupKey, CacheEntry>>>;
type PendingLookup = Shared<BoxFuture<'static, Option<TenantBrand>>>;

// =============================================================================
// RESOLVER
// =============================================================================

pub struct TenantResolver {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    platform_domains: Vec<String>,
    ttl: Duration,
    max_entries: usize,
    cache: Cache,
    in_flight: Arc<Mutex<HashMap<LookupKey, PendingLookup>>>,
}

impl TenantResolver {
    #[must_use]
    pub fn new(
        base_url: &str,
        transport: Arc<dyn HttpTransport>,
        platform_domains: &[String],
        ttl: Duration,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            transport,
            platform_domains: platform_domains
                .iter()
                .map(|d| normalize_host(d))
                .filter(|d| !d.is_empty())
                .collect(),
            ttl,
            max_entries: MAX_CACHED_LOOKUPS,
            cache: Arc::new(Mutex::new(HashMap::new())),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// True for a platform domain or any subdomain of one.
    #[must_use]
    pub fn is_platform_domain(&self, domain: &str) -> bool {
        let domain = normalize_host(domain);
        self.platform_domains.iter().any(|platform| {
            domain == *platform
                || domain
                    .strip_suffix(platform.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    /// Tenant owning `domain`, or `None` for platform and unknown domains.
    pub async fn resolve_by_domain(&self, domain: &str) -> Option<TenantBrand> {
        self.resolve_by_domain_at(domain, Instant::now()).await
    }

    async fn resolve_by_domain_at(&self, domain: &str, now: Instant) -> Option<TenantBrand> {
        let domain = normalize_host(domain);
        if domain.is_empty() || self.is_platform_domain(&domain) {
            return None;
        }
        self.lookup(LookupKey::Domain(domain), now).await
    }

    /// Tenant with `slug`, or `None` if unknown.
    pub async fn resolve_by_slug(&self, slug: &str) -> Option<TenantBrand> {
        self.resolve_by_slug_at(slug, Instant::now()).await
    }

    async fn resolve_by_slug_at(&self, slug: &str, now: Instant) -> Option<TenantBrand> {
        let slug = slug.trim().to_ascii_lowercase();
        if matches!(slug.as_str(), "" | "." | "..") {
            return None;
        }
        self.lookup(LookupKey::Slug(slug), now).await
    }

    /// Resolve a raw `Host` header value (port and case tolerated).
    pub async fn resolve_host(&self, host: &str) -> Option<TenantBrand> {
        self.resolve_by_domain(host).await
    }

    /// Branding for a raw `Host` header value.
    pub async fn branding_for_host(&self, host: &str) -> Branding {
        Branding::for_tenant(self.resolve_host(host).await)
    }

    /// Drop every cached answer.
    pub fn invalidate(&self) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    async fn lookup(&self, key: LookupKey, now: Instant) -> Option<TenantBrand> {
        {
            let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = cache.get(&key) {
                if now.saturating_duration_since(entry.fetched_at) < self.ttl {
                    return entry.brand.clone();
                }
            }
        }

        let pending = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(pending) = in_flight.get(&key) {
                tracing::debug!(?key, "joining in-flight tenant lookup");
                pending.clone()
            } else {
                let pending = self.start_lookup(key.clone(), now);
                in_flight.insert(key, pending.clone());
                pending
            }
        };
        pending.await
    }

    /// Directory call for `key` that records its answer in the cache and
    /// then leaves `in_flight`.
    fn start_lookup(&self, key: LookupKey, now: Instant) -> PendingLookup {
        let url = key.url(&self.base_url);
        let transport = Arc::clone(&self.transport);
        let cache = Arc::clone(&self.cache);
        let in_flight = Arc::clone(&self.in_flight);
        let (ttl, max_entries) = (self.ttl, self.max_entries);

        async move {
            let fetched = match url {
                Some(url) => fetch(transport.as_ref(), url, &key).await,
                None => {
                    tracing::warn!(?key, "tenant directory URL could not be built");
                    None
                }
            };
            if let Some(brand) = &fetched {
                let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
                cache.retain(|_, entry| now.saturating_duration_since(entry.fetched_at) < ttl);
                if cache.len() >= max_entries {
                    let oldest = cache
                        .iter()
                        .min_by_key(|(_, entry)| entry.fetched_at)
                        .map(|(key, _)| key.clone());
                    if let Some(oldest) = oldest {
                        cache.remove(&oldest);
                    }
                }
                cache.insert(key.clone(), CacheEntry { fetched_at: now, brand: brand.clone() });
            }
            in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
            fetched.flatten()
        }
        .boxed()
        .shared()
    }
}

/// `None` when no response arrived (not cacheable); `Some(None)` when the
/// directory answered without a usable tenant.
async fn fetch(transport: &dyn HttpTransport, url: Url, key: &LookupKey) -> Option<Option<TenantBrand>> {
    let request = ApiRequest { method: Method::Get, url: url.to_string(), bearer: None, body: None };
    let response = match transport.send(request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, ?key, "tenant lookup failed");
            return None;
        }
    };
    if !response.is_success() {
        tracing::debug!(status = response.status, ?key, "tenant not found");
        return Some(None);
    }
    match response.json::<TenantBrand>() {
        Ok(brand) => {
            tracing::debug!(tenant = %brand.slug, ?key, "tenant resolved");
            Some(Some(brand))
        }
        Err(e) => {
            tracing::warn!(error = %e, ?key, "tenant lookup returned malformed brand");
            Some(None)
        }
    }
}

/// Lowercase, drop any port and trailing dot: `"Acme.Example.com:443"` ->
/// `"acme.example.com"`. Anything that is not a plain DNS name (IP literals
/// in brackets, `/`, `?`, whitespace) normalizes to `""`.
#[must_use]
pub fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let host = host.split_once(':').map_or(host, |(name, _)| name);
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    if host
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'.' || b == b'-')
    {
        host
    } else {
        String::new()
    }
}

impl std::fmt::Debug for TenantResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantResolver")
            .field("base_url", &self.base_url)
            .field("platform_domains", &self.platform_domains)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "tenant_test.rs"]
mod tests;
