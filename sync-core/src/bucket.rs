//! Cache bucket naming and request keys.

use offline_sync_types::HttpMethod;
use url::Url;

/// Name of the bucket for a build version, e.g. `candy-route-v3`.
pub fn bucket_name(prefix: &str, version: &str) -> String {
    format!("{}-{}", prefix, version)
}

/// Buckets that must be deleted at activation: every name except `current`.
pub fn stale_buckets<'a>(existing: &'a [String], current: &str) -> Vec<&'a str> {
    existing
        .iter()
        .map(String::as_str)
        .filter(|name| *name != current)
        .collect()
}

/// Cache key for an exact request.
///
/// The fragment never reaches the server, so it is not part of the key.
pub fn request_key(method: HttpMethod, url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    format!("{} {}", method, url)
}
