//! Recorded-request domain model.
//!
//! A [`RecordedRequest`] is a persisted snapshot of one inbound request and
//! its corresponding proxied response, captured by the learning-mode proxy.
//!
//! # Module Structure
//!
//! - `cookie` - Cookie / Set-Cookie header parsing
//! - `storage` - storage-document serialization contract

pub mod cookie;
pub mod storage;

pub use storage::RecordedRequestDocument;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An ordered name/value pair used for headers, query params, and request
/// cookies. Order reflects the original wire order; duplicate names are legal
/// (e.g. repeated `Set-Cookie`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameValuePair {
    pub name: String,
    pub value: String,
}

impl NameValuePair {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Optional cookie attributes; each field is present only if the source
/// `Set-Cookie` value carried it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

/// A structured response cookie parsed from one `Set-Cookie` header value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseCookie {
    pub name: String,
    pub value: String,
    pub properties: CookieProperties,
}

/// Captured inbound side of a proxied exchange.
///
/// `headers` excludes the raw `cookie` header (cookies are represented
/// structurally in `cookies`). `body` is `""` when no body was sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub full_path: String,
    pub body: String,
    pub params: Vec<NameValuePair>,
    pub headers: Vec<NameValuePair>,
    pub cookies: Vec<NameValuePair>,
}

/// Captured outbound side of a proxied exchange.
///
/// `headers` excludes `content-type` and `set-cookie`; both are represented
/// structurally. `elapsed_ms` is the wall-clock time between inbound request
/// receipt and proxied response completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedResponse {
    pub content_type: Option<String>,
    pub status_code: u16,
    pub elapsed_ms: u64,
    pub body: String,
    pub headers: Vec<NameValuePair>,
    pub cookies: Vec<ResponseCookie>,
}

/// A persisted request/response snapshot.
///
/// `id` is store-assigned on insert and globally unique. Records are
/// insert-only; they are deleted individually by id or in bulk by project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub project: String,
    pub timestamp: DateTime<Utc>,
    pub request: CapturedRequest,
    pub response: CapturedResponse,
}

/// Limited projection of a [`RecordedRequest`] for list views where full
/// payload detail is unnecessary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedRequestSummary {
    pub id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub full_path: String,
}

impl From<&RecordedRequest> for RecordedRequestSummary {
    fn from(recorded: &RecordedRequest) -> Self {
        Self {
            id: recorded.id.clone(),
            timestamp: recorded.timestamp,
            method: recorded.request.method.clone(),
            full_path: recorded.request.full_path.clone(),
        }
    }
}
