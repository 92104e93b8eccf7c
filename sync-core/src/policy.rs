//! Request routing for the background worker.
//!
//! Decides, without any I/O, whether an outgoing request is intercepted and
//! which caching strategy applies to it.

use offline_sync_types::HttpMethod;
use url::Url;

/// Strategy chosen for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Not intercepted; goes straight to the network.
    Bypass,
    /// Network first, cached copy on transport failure.
    NetworkFirst,
    /// Cached copy first, refreshed in the background.
    CacheFirst,
}

/// Interception scope: the site origin plus pinned cross-origin hosts.
#[derive(Debug, Clone)]
pub struct ScopePolicy {
    origin: Url,
    allowed_hosts: Vec<String>,
    api_prefix: String,
}

impl ScopePolicy {
    /// Create a policy for the given site origin.
    pub fn new(origin: Url, allowed_hosts: Vec<String>, api_prefix: &str) -> Self {
        Self {
            origin,
            allowed_hosts: allowed_hosts
                .into_iter()
                .map(|host| host.to_ascii_lowercase())
                .collect(),
            api_prefix: api_prefix.to_string(),
        }
    }

    /// The site origin.
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Resolve a possibly relative URL against the site origin.
    pub fn resolve(&self, url: &str) -> Result<Url, url::ParseError> {
        self.origin.join(url)
    }

    /// Check if a URL shares the site's scheme, host and port.
    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin.origin()
    }

    /// Check if a URL is on the cross-origin allow-list.
    pub fn is_allowed_cross_origin(&self, url: &Url) -> bool {
        url.host_str()
            .map(|host| {
                let host = host.to_ascii_lowercase();
                self.allowed_hosts.iter().any(|allowed| *allowed == host)
            })
            .unwrap_or(false)
    }

    /// Check if a URL falls under the API namespace.
    pub fn is_api(&self, url: &Url) -> bool {
        url.path().starts_with(&self.api_prefix)
    }

    /// Pick the strategy for a request.
    ///
    /// Only GET requests are intercepted. Same-origin API or JSON requests
    /// are network-first; everything else in scope is cache-first.
    pub fn route(&self, method: HttpMethod, url: &Url, accept: Option<&str>) -> Route {
        if method != HttpMethod::Get {
            return Route::Bypass;
        }

        if self.is_same_origin(url) {
            let wants_json = accept
                .map(|value| value.contains(offline_sync_types::JSON))
                .unwrap_or(false);
            if self.is_api(url) || wants_json {
                Route::NetworkFirst
            } else {
                Route::CacheFirst
            }
        } else if self.is_allowed_cross_origin(url) {
            Route::CacheFirst
        } else {
            Route::Bypass
        }
    }
}
