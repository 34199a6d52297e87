//! Route dispatch logic for the Admin API.

use crate::metrics::MetricsAggregator;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

#[derive(Serialize)]
struct ErrorResponse {
    errors: Vec<ErrorDetail>,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Main request router
pub async fn route_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsAggregator>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method();
    let path = req.uri().path();

    debug!("Admin API: {} {}", method, path);

    let response = match (method, path) {
        (&Method::GET, "/health") => handle_health(),
        (&Method::GET, "/metrics") => handle_metrics(&metrics),
        _ => not_found(),
    };
    Ok(response)
}

/// GET /health - Health check
fn handle_health() -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &serde_json::json!({"status": "ok"}))
}

/// GET /metrics - per-project metrics snapshot
fn handle_metrics(metrics: &MetricsAggregator) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &metrics.snapshot())
}

/// Create a JSON response
fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string_pretty(body).unwrap_or_else(|_| "{}".to_string());
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(json)))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Internal Server Error"))))
}

/// Create a not found response
fn not_found() -> Response<Full<Bytes>> {
    let error = ErrorResponse {
        errors: vec![ErrorDetail {
            code: StatusCode::NOT_FOUND.as_str().to_string(),
            message: "Not Found".to_string(),
        }],
    };
    json_response(StatusCode::NOT_FOUND, &error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventBus, ServerEvent, ServerStartedEvent};
    use chrono::Utc;
    use http_body_util::BodyExt;

    async fn body_json(response: Response<Full<Bytes>>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = handle_health();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn metrics_returns_aggregator_snapshot() {
        let bus = EventBus::new();
        let metrics = Arc::new(MetricsAggregator::new());
        metrics.attach(&bus);
        bus.publish(&ServerEvent::Started(ServerStartedEvent {
            timestamp: Utc::now(),
            port: 8080,
            bind_address: "0.0.0.0".to_string(),
            project: "shop".to_string(),
        }));

        let response = handle_metrics(&metrics);
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["starts"]["shop"][0]["port"], 8080);
        assert!(body["totalRequests"].as_object().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_route_yields_json_404() {
        let response = not_found();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["errors"][0]["code"], "404");
    }
}
