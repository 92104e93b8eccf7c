//! reqwest-backed replayer.

use super::{ReplayError, ReplayRequest, Replayer};
use async_trait::async_trait;
use offline_sync_types::HttpMethod;
use url::Url;

/// Replays queued actions against the real backend.
///
/// Relative URLs are resolved against `base_url`. No explicit timeout is
/// set; the transport default applies.
#[derive(Debug, Clone)]
pub struct HttpReplayer {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpReplayer {
    /// Create a replayer for the backend at `base_url`.
    pub fn new(base_url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// The backend base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a queued URL against the base URL.
    pub fn resolve(&self, url: &str) -> Result<Url, ReplayError> {
        self.base_url
            .join(url)
            .map_err(|e| ReplayError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}

fn to_reqwest(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Head => reqwest::Method::HEAD,
    }
}

#[async_trait]
impl Replayer for HttpReplayer {
    async fn execute(&self, request: &ReplayRequest) -> Result<u16, ReplayError> {
        let url = self.resolve(&request.url)?;

        let mut builder = self.client.request(to_reqwest(request.method), url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ReplayError::Transport(e.to_string()))?;

        Ok(response.status().as_u16())
    }
}
