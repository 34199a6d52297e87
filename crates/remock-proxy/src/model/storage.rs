//! Storage-document serialization contract.
//!
//! The embedded store persists [`RecordedRequestDocument`], not the domain
//! entity directly. The mapping is statically declared in both directions:
//! the store's identifier field `_id` aliases the domain `id` attribute, and
//! timestamps are stored as epoch milliseconds so the store can range and
//! sort on them. Round-tripping a document yields a field-for-field equal
//! [`RecordedRequest`].

use super::{CapturedRequest, CapturedResponse, RecordedRequest};
use chrono::serde::ts_milliseconds;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire/storage shape of a recorded request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedRequestDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub project: String,
    #[serde(with = "ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub request: CapturedRequest,
    pub response: CapturedResponse,
}

impl From<RecordedRequest> for RecordedRequestDocument {
    fn from(recorded: RecordedRequest) -> Self {
        Self {
            id: recorded.id,
            project: recorded.project,
            timestamp: recorded.timestamp,
            request: recorded.request,
            response: recorded.response,
        }
    }
}

impl From<RecordedRequestDocument> for RecordedRequest {
    fn from(document: RecordedRequestDocument) -> Self {
        Self {
            id: document.id,
            project: document.project,
            timestamp: document.timestamp,
            request: document.request,
            response: document.response,
        }
    }
}
