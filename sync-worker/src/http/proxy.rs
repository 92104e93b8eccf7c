//! Interception proxy: every request not aimed at the worker's own
//! endpoints is answered by the [`CacheManager`].

use crate::error::WorkerError;
use crate::fetch::{is_hop_by_hop, FetchRequest, FetchResponse};
use crate::manager::CacheManager;
use axum::body::{to_bytes, Body};
use axum::http::{HeaderName, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use offline_sync_types::HttpMethod;
use std::sync::Arc;
use url::Url;

/// Largest request body the proxy will buffer.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Proxy handler.
pub async fn proxy_handler(
    Extension(manager): Extension<Arc<CacheManager>>,
    request: Request<Body>,
) -> Response {
    let fetch = match to_fetch_request(manager.policy().origin(), request).await {
        Ok(fetch) => fetch,
        Err(rejection) => return rejection,
    };

    match manager.handle_fetch(fetch).await {
        Ok(response) => to_response(response),
        Err(e @ WorkerError::Interception { .. }) => {
            tracing::debug!(error = %e, "no network and no cache");
            (StatusCode::GATEWAY_TIMEOUT, e.to_string()).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "proxy error");
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}

/// Convert an incoming request into the worker's request type.
///
/// Origin-form URIs (`/path?query`) resolve against the site origin;
/// absolute-form URIs are used as-is.
#[allow(clippy::result_large_err)]
pub async fn to_fetch_request(
    origin: &Url,
    request: Request<Body>,
) -> Result<FetchRequest, Response> {
    let (parts, body) = request.into_parts();

    let method: HttpMethod = parts
        .method
        .as_str()
        .parse()
        .map_err(|_| StatusCode::METHOD_NOT_ALLOWED.into_response())?;

    let uri = parts.uri.to_string();
    let url = if parts.uri.scheme().is_some() {
        Url::parse(&uri)
    } else {
        origin.join(&uri)
    }
    .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()).into_response())?;

    let body = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()).into_response())?;

    let mut fetch = FetchRequest::new(method, url).with_body(body.to_vec());
    for (name, value) in &parts.headers {
        if is_hop_by_hop(name.as_str()) {
            continue;
        }
        if let Ok(value) = value.to_str() {
            fetch = fetch.with_header(name.as_str(), value);
        }
    }
    Ok(fetch)
}

/// Convert a worker response into an HTTP response.
pub fn to_response(response: FetchResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut out = (status, Body::from(response.body)).into_response();

    for (name, value) in &response.headers {
        if is_hop_by_hop(name) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            out.headers_mut().insert(name, value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("http://site.test/").unwrap()
    }

    #[tokio::test]
    async fn origin_form_resolves_against_site() {
        let request = Request::builder()
            .uri("/route?day=mon")
            .header("Accept", "text/html")
            .header("Host", "127.0.0.1:8080")
            .body(Body::empty())
            .unwrap();

        let fetch = to_fetch_request(&origin(), request).await.unwrap();

        assert_eq!(fetch.method, HttpMethod::Get);
        assert_eq!(fetch.url.as_str(), "http://site.test/route?day=mon");
        assert_eq!(fetch.accept(), Some("text/html"));
        assert!(!fetch.headers.contains_key("host"));
    }

    #[tokio::test]
    async fn absolute_form_is_kept() {
        let request = Request::builder()
            .uri("https://unpkg.com/leaflet@1.9.4/dist/leaflet.js")
            .body(Body::empty())
            .unwrap();

        let fetch = to_fetch_request(&origin(), request).await.unwrap();
        assert_eq!(fetch.url.host_str(), Some("unpkg.com"));
    }

    #[tokio::test]
    async fn body_is_buffered() {
        let request = Request::builder()
            .method("POST")
            .uri("/payments/record")
            .body(Body::from("amount=5"))
            .unwrap();

        let fetch = to_fetch_request(&origin(), request).await.unwrap();
        assert_eq!(fetch.method, HttpMethod::Post);
        assert_eq!(fetch.body, b"amount=5");
    }

    #[tokio::test]
    async fn unsupported_method_is_rejected() {
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/")
            .body(Body::empty())
            .unwrap();

        let rejection = to_fetch_request(&origin(), request).await.unwrap_err();
        assert_eq!(rejection.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn response_headers_are_copied() {
        let response = to_response(
            FetchResponse::ok("hi")
                .with_header("Content-Type", "text/plain")
                .with_header("Transfer-Encoding", "chunked"),
        );

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/plain");
        assert!(response.headers().get("transfer-encoding").is_none());
    }
}
