//! Recording service facade over the persistence layer.
//!
//! All proxy and API callers go through this service rather than the store
//! directly. Failure paths log operation and identifiers before propagating
//! the error unchanged in kind.

use crate::model::RecordedRequest;
use crate::query::QueryOpts;
use crate::store::{RequestStore, StoreError};
use std::sync::Arc;
use tracing::{debug, error};

pub struct RecordingService {
    store: Arc<RequestStore>,
}

impl RecordingService {
    pub fn new(store: Arc<RequestStore>) -> Self {
        Self { store }
    }

    /// Persist one recorded request/response cycle; returns the stored form
    /// with its assigned id.
    pub async fn save_recorded_request(
        &self,
        recorded: RecordedRequest,
    ) -> Result<RecordedRequest, StoreError> {
        let project = recorded.project.clone();
        let path = recorded.request.path.clone();
        self.store.insert(recorded).await.inspect_err(|err| {
            error!(project = %project, path = %path, "failed to save recorded request: {err}");
        })
    }

    /// List recorded requests for a project, with optional sort/skip/limit.
    pub async fn find_recorded_requests(
        &self,
        project: &str,
        opts: Option<&QueryOpts>,
    ) -> Result<Vec<RecordedRequest>, StoreError> {
        self.store.find(project, opts).await.inspect_err(|err| {
            error!(project = %project, "failed to find recorded requests: {err}");
        })
    }

    /// Retrieve one recorded request by id.
    ///
    /// The `project` parameter exists for API symmetry; ids are globally
    /// unique and the lookup keys only on id.
    pub async fn retrieve_recorded_request(
        &self,
        project: &str,
        id: &str,
    ) -> Result<RecordedRequest, StoreError> {
        debug!(project = %project, id = %id, "retrieving recorded request");
        self.store.find_one(id).await.inspect_err(|err| {
            error!(project = %project, id = %id, "failed to retrieve recorded request: {err}");
        })
    }

    /// Remove one recorded request by id; returns the removed count.
    ///
    /// As with retrieval, `project` is accepted for symmetry but the delete
    /// keys only on id.
    pub async fn remove_recorded_request(
        &self,
        project: &str,
        id: &str,
    ) -> Result<usize, StoreError> {
        debug!(project = %project, id = %id, "removing recorded request");
        self.store.remove(id).await.inspect_err(|err| {
            error!(project = %project, id = %id, "failed to remove recorded request: {err}");
        })
    }

    /// Remove every recorded request for a project; returns the removed count.
    pub async fn remove_all(&self, project: &str) -> Result<usize, StoreError> {
        self.store.remove_all(project).await.inspect_err(|err| {
            error!(project = %project, "failed to remove recorded requests: {err}");
        })
    }

    /// Number of recorded requests held for a project.
    pub async fn count(&self, project: &str) -> Result<u64, StoreError> {
        self.store.count(project).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CapturedRequest, CapturedResponse, RecordedRequest};
    use chrono::{TimeZone, Utc};

    fn recorded(project: &str) -> RecordedRequest {
        RecordedRequest {
            id: None,
            project: project.to_string(),
            timestamp: Utc.timestamp_millis_opt(1_000).unwrap(),
            request: CapturedRequest {
                method: "GET".to_string(),
                path: "/x".to_string(),
                full_path: "/x".to_string(),
                body: String::new(),
                params: vec![],
                headers: vec![],
                cookies: vec![],
            },
            response: CapturedResponse {
                content_type: None,
                status_code: 204,
                elapsed_ms: 1,
                body: String::new(),
                headers: vec![],
                cookies: vec![],
            },
        }
    }

    fn service() -> (tempfile::TempDir, RecordingService) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RequestStore::open(dir.path()).unwrap());
        (dir, RecordingService::new(store))
    }

    #[tokio::test]
    async fn save_then_retrieve_round_trips() {
        let (_dir, service) = service();
        let saved = service.save_recorded_request(recorded("p1")).await.unwrap();
        let id = saved.id.clone().unwrap();

        let fetched = service.retrieve_recorded_request("p1", &id).await.unwrap();
        assert_eq!(fetched, saved);
    }

    #[tokio::test]
    async fn remove_of_unknown_id_surfaces_not_found() {
        let (_dir, service) = service();
        let err = service
            .remove_recorded_request("p1", "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn lookup_ignores_project_parameter() {
        // Ids are globally unique; the project argument does not scope the
        // lookup.
        let (_dir, service) = service();
        let saved = service.save_recorded_request(recorded("p1")).await.unwrap();
        let id = saved.id.clone().unwrap();

        let fetched = service
            .retrieve_recorded_request("another-project", &id)
            .await
            .unwrap();
        assert_eq!(fetched.project, "p1");
    }

    #[tokio::test]
    async fn remove_all_reports_zero_for_empty_project() {
        let (_dir, service) = service();
        assert_eq!(service.remove_all("empty").await.unwrap(), 0);
    }
}
