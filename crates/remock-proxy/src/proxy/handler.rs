//! Per-request pipeline of the learning-mode proxy.
//!
//! Every inbound request is forwarded to the target host, the streamed
//! response is drained, and the completed exchange is reconstructed into a
//! [`RecordedRequest`]. Persistence and the `request-received` event run on a
//! spawned task, strictly off the response path: a slow or failing store
//! write never delays or fails the proxied response.

use super::capture::{capture_request, capture_response};
use super::forwarding::{error_response, forward_request};
use crate::events::{EventBus, RequestReceivedEvent, ServerEvent};
use crate::model::cookie::strip_domain_attribute;
use crate::model::RecordedRequest;
use crate::proxy::client::HttpClient;
use crate::recording::RecordingService;
use chrono::Utc;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, SET_COOKIE};
use hyper::{Request, Response};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Shared, immutable state for the request pipeline; one instance per
/// running proxy server.
pub struct ProxyContext {
    pub http_client: HttpClient,
    /// Target origin, e.g. `http://localhost:8080`.
    pub target_origin: String,
    /// Host header value for the target, e.g. `localhost:8080`.
    pub target_host: String,
    pub project: String,
    pub recorder: Arc<RecordingService>,
    pub events: Arc<EventBus>,
}

/// Handle one proxied request end to end.
pub async fn handle_request(
    ctx: Arc<ProxyContext>,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let received_at = Utc::now();
    let start = Instant::now();

    let (parts, body) = req.into_parts();
    let body_bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            error!("Failed to read inbound request body: {}", e);
            return Ok(error_response(400, "Failed to read request body"));
        }
    };

    let upstream = forward_request(
        &ctx.http_client,
        parts.method.clone(),
        &parts.uri,
        &parts.headers,
        body_bytes.clone(),
        &ctx.target_origin,
        &ctx.target_host,
    )
    .await;

    let (mut response_parts, response_body) = match upstream {
        Ok(result) => result,
        Err(e) => {
            // Nothing is recorded for an exchange the target never completed.
            error!(
                method = %parts.method,
                path = %parts.uri.path(),
                "Failed to forward request to target: {e}"
            );
            return Ok(error_response(502, "Bad Gateway"));
        }
    };

    let elapsed_ms = start.elapsed().as_millis() as u64;

    // Stream fully drained: safe to reconstruct the exchange.
    let captured_request = capture_request(&parts.method, &parts.uri, &parts.headers, &body_bytes);
    let captured_response = capture_response(&response_parts, &response_body, elapsed_ms);
    let recorded = RecordedRequest {
        id: None,
        project: ctx.project.clone(),
        timestamp: received_at,
        request: captured_request,
        response: captured_response,
    };

    strip_cookie_domains(&mut response_parts.headers);
    let response = Response::from_parts(response_parts, Full::new(response_body));

    // Off the critical path: the insert and the event never delay or fail
    // the proxied response. The task is spawned before hyper writes the
    // response bytes, so persistence may land before, during, or after
    // delivery; only the persist-then-publish order within the task is
    // guaranteed.
    let recorder = Arc::clone(&ctx.recorder);
    let events = Arc::clone(&ctx.events);
    let project = ctx.project.clone();
    tokio::spawn(async move {
        match recorder.save_recorded_request(recorded).await {
            Ok(saved) => {
                debug!(
                    project = %project,
                    id = saved.id.as_deref().unwrap_or(""),
                    "recorded proxied request"
                );
                events.publish(&ServerEvent::RequestReceived(RequestReceivedEvent {
                    timestamp: Utc::now(),
                    project,
                }));
            }
            Err(e) => {
                error!(project = %project, "failed to persist recorded request: {e}");
            }
        }
    });

    Ok(response)
}

/// Rewrite `Set-Cookie` headers so recorded cookies carry no `Domain`
/// restriction and stay portable across hosts.
fn strip_cookie_domains(headers: &mut hyper::HeaderMap) {
    let rewritten: Vec<HeaderValue> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| {
            let raw = value.to_str().ok()?;
            HeaderValue::from_str(&strip_domain_attribute(raw)).ok()
        })
        .collect();
    if rewritten.is_empty() {
        return;
    }
    headers.remove(SET_COOKIE);
    for value in rewritten {
        if headers.try_append(SET_COOKIE, value).is_err() {
            warn!("dropping unrepresentable Set-Cookie value");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_cookie_domains_rewrites_all_values_in_order() {
        let mut headers = hyper::HeaderMap::new();
        headers.append(
            SET_COOKIE,
            HeaderValue::from_static("a=1; Domain=example.com; Path=/"),
        );
        headers.append(SET_COOKIE, HeaderValue::from_static("b=2; Secure"));

        strip_cookie_domains(&mut headers);

        let values: Vec<&str> = headers
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(values, vec!["a=1; Path=/", "b=2; Secure"]);
    }

    #[test]
    fn strip_cookie_domains_leaves_other_headers_alone() {
        let mut headers = hyper::HeaderMap::new();
        headers.insert("x-test", HeaderValue::from_static("a"));

        strip_cookie_domains(&mut headers);

        assert_eq!(headers.get("x-test").unwrap(), "a");
        assert!(headers.get(SET_COOKIE).is_none());
    }
}
