//! Request forwarding to the target host.
//!
//! Forwarding rewrites the origin: the inbound `Host` header is dropped and
//! the target's host takes its place, so the target sees itself as the
//! requested origin. The streamed upstream response body is drained to
//! completion before anything else happens; recording a partially-read body
//! would race the stream and lose data.

use super::client::HttpClient;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::HOST;
use hyper::http::response::Parts;
use hyper::{HeaderMap, Method, Request, Response, Uri};
use std::convert::Infallible;
use tracing::{debug, error};

/// Helper function to create a JSON error response.
pub fn error_response(status: u16, message: &str) -> Response<Full<Bytes>> {
    let body = format!(r#"{{"error": "{message}"}}"#);
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// Forward a request with a pre-collected body to the target and drain the
/// response stream. Returns the response head and the fully accumulated body.
pub async fn forward_request(
    http_client: &HttpClient,
    method: Method,
    uri: &Uri,
    headers: &HeaderMap,
    body_bytes: Bytes,
    target_origin: &str,
    target_host: &str,
) -> Result<(Parts, Bytes), anyhow::Error> {
    let target_path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let full_uri = format!("{target_origin}{target_path}");

    debug!("Forwarding to: {}", full_uri);

    let mut upstream_req = Request::builder().method(method).uri(full_uri);

    // Copy headers, replacing host with the target's (change-origin).
    for (key, value) in headers.iter() {
        if key != &HOST {
            upstream_req = upstream_req.header(key, value);
        }
    }
    upstream_req = upstream_req.header(HOST, target_host);

    let upstream_req = upstream_req
        .body(BoxBody::new(
            Full::new(body_bytes).map_err(|never: Infallible| match never {}),
        ))
        .map_err(|e| anyhow::anyhow!("failed to build upstream request: {e}"))?;

    let upstream_response = http_client
        .request(upstream_req)
        .await
        .map_err(|e| anyhow::anyhow!("upstream request failed: {e}"))?;

    let (parts, body) = upstream_response.into_parts();
    let body_bytes = body
        .collect()
        .await
        .map_err(|e| {
            error!("Failed to collect upstream response body: {}", e);
            anyhow::anyhow!("failed to read upstream response body: {e}")
        })?
        .to_bytes();

    Ok((parts, body_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_carries_status_and_json_body() {
        let response = error_response(502, "Bad Gateway");
        assert_eq!(response.status(), 502);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );
    }

    #[test]
    fn error_response_400() {
        let response = error_response(400, "Bad Request");
        assert_eq!(response.status(), 400);
    }
}
