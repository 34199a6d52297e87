//! Embedded persistence for recorded requests.
//!
//! One SQLite file per db-location, opened once and owned by a single
//! [`RequestStore`]. The connection sits behind a mutex and all operations run
//! on the blocking pool, so concurrent inserts are serialized by the store
//! itself. Records are stored as self-describing JSON documents (the
//! [`RecordedRequestDocument`] shape) alongside the columns needed for
//! filtering and sorting.

use crate::model::{RecordedRequest, RecordedRequestDocument};
use crate::query::QueryOpts;
use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

const STORE_FILE: &str = "recorded_requests.sqlite";

/// Columns a caller may sort on. Sort fields outside this set fail
/// validation before any SQL is built.
const SORTABLE_FIELDS: &[&str] = &["timestamp", "id", "project", "method", "path"];

/// Store error taxonomy. Validation, not-found, and uniqueness failures are
/// distinct kinds so an API layer can translate them into 4xx responses;
/// everything else surfaces as a storage error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid query options: {0}")]
    InvalidQuery(String),
    #[error("recorded request '{0}' does not exist")]
    NotFound(String),
    #[error("recorded request '{0}' already exists")]
    Duplicate(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Storage(anyhow::Error::new(err))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Storage(anyhow::Error::new(err))
    }
}

/// Persistence service for recorded requests.
pub struct RequestStore {
    db: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl RequestStore {
    /// Open (or create) the store file under `base_path`.
    pub fn open(base_path: &Path) -> anyhow::Result<Self> {
        if !base_path.exists() {
            fs::create_dir_all(base_path)?;
        }
        let db_path = base_path.join(STORE_FILE);
        let conn = Connection::open(&db_path)?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS recorded_requests (
                id TEXT PRIMARY KEY,
                project TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                method TEXT NOT NULL,
                path TEXT NOT NULL,
                data TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_recorded_requests_project
                ON recorded_requests(project);
            CREATE INDEX IF NOT EXISTS idx_recorded_requests_timestamp
                ON recorded_requests(timestamp DESC);
            ",
        )?;

        info!("Recorded-request store opened at {:?}", db_path);
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            db_path,
        })
    }

    /// Path of the underlying store file.
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Insert a recorded request and return the stored form, carrying the
    /// store-assigned id. Inserting a pre-existing id fails with
    /// [`StoreError::Duplicate`] and leaves the original record intact.
    pub async fn insert(&self, recorded: RecordedRequest) -> Result<RecordedRequest, StoreError> {
        let mut document = RecordedRequestDocument::from(recorded);
        let id = match document.id.clone() {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                document.id = Some(id.clone());
                id
            }
        };
        let payload = serde_json::to_string(&document)?;
        let db = Arc::clone(&self.db);

        run_blocking(move || {
            let conn = db.lock().expect("store mutex poisoned");
            let inserted = conn.execute(
                "INSERT INTO recorded_requests (id, project, timestamp, method, path, data)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    document.project,
                    document.timestamp.timestamp_millis(),
                    document.request.method,
                    document.request.path,
                    payload,
                ],
            );
            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    return Err(StoreError::Duplicate(id));
                }
                Err(err) => return Err(err.into()),
            }

            // Read the stored form back so the caller sees exactly what the
            // store holds, id included.
            let stored: String = conn.query_row(
                "SELECT data FROM recorded_requests WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )?;
            let document: RecordedRequestDocument = serde_json::from_str(&stored)?;
            Ok(RecordedRequest::from(document))
        })
        .await
    }

    /// Find all recorded requests for a project, applying sort, then skip,
    /// then limit. Without options, records come back in insertion order.
    pub async fn find(
        &self,
        project: &str,
        opts: Option<&QueryOpts>,
    ) -> Result<Vec<RecordedRequest>, StoreError> {
        if let Some(opts) = opts {
            validate_query_opts(opts)?;
        }

        let order_clause = opts
            .and_then(|opts| opts.sort.as_ref())
            .map(|keys| {
                let columns: Vec<String> = keys
                    .iter()
                    .map(|key| format!("{} {}", key.field, key.direction.as_sql()))
                    .collect();
                format!("ORDER BY {}", columns.join(", "))
            })
            .unwrap_or_default();
        // SQLite requires LIMIT when OFFSET is present; -1 means unbounded.
        let limit = opts
            .and_then(|opts| opts.limit)
            .map(|limit| limit as i64)
            .unwrap_or(-1);
        let offset = opts.map(|opts| opts.skip as i64).unwrap_or(0);

        let project = project.to_string();
        let db = Arc::clone(&self.db);

        run_blocking(move || {
            let conn = db.lock().expect("store mutex poisoned");
            let sql = format!(
                "SELECT data FROM recorded_requests WHERE project = ?1 {order_clause} LIMIT ?2 OFFSET ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![project, limit, offset])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let data: String = row.get(0)?;
                let document: RecordedRequestDocument = serde_json::from_str(&data)?;
                out.push(RecordedRequest::from(document));
            }
            Ok(out)
        })
        .await
    }

    /// Look up exactly one recorded request by id. Zero matches is a
    /// not-found error; more than one indicates a consistency violation and
    /// is surfaced rather than silently resolved.
    pub async fn find_one(&self, id: &str) -> Result<RecordedRequest, StoreError> {
        let id = id.to_string();
        let db = Arc::clone(&self.db);

        run_blocking(move || {
            let conn = db.lock().expect("store mutex poisoned");
            let mut stmt = conn.prepare("SELECT data FROM recorded_requests WHERE id = ?1")?;
            let mut rows = stmt.query(params![id])?;
            let mut matches = Vec::new();
            while let Some(row) = rows.next()? {
                let data: String = row.get(0)?;
                matches.push(data);
            }
            match matches.len() {
                0 => Err(StoreError::NotFound(id)),
                1 => {
                    let document: RecordedRequestDocument = serde_json::from_str(&matches[0])?;
                    Ok(RecordedRequest::from(document))
                }
                n => Err(StoreError::Storage(anyhow::anyhow!(
                    "consistency violation: {n} records share id '{id}'"
                ))),
            }
        })
        .await
    }

    /// Delete exactly one record by id; returns the removed count (always 1
    /// on success). Zero removals is a not-found error.
    pub async fn remove(&self, id: &str) -> Result<usize, StoreError> {
        let id = id.to_string();
        let db = Arc::clone(&self.db);

        run_blocking(move || {
            let conn = db.lock().expect("store mutex poisoned");
            let removed =
                conn.execute("DELETE FROM recorded_requests WHERE id = ?1", params![id])?;
            if removed == 0 {
                return Err(StoreError::NotFound(id));
            }
            debug!(id = %id, "removed recorded request");
            Ok(removed)
        })
        .await
    }

    /// Delete all records for a project; returns the removed count (0 is not
    /// an error).
    pub async fn remove_all(&self, project: &str) -> Result<usize, StoreError> {
        let project = project.to_string();
        let db = Arc::clone(&self.db);

        run_blocking(move || {
            let conn = db.lock().expect("store mutex poisoned");
            let removed = conn.execute(
                "DELETE FROM recorded_requests WHERE project = ?1",
                params![project],
            )?;
            debug!(project = %project, removed, "removed recorded requests");
            Ok(removed)
        })
        .await
    }

    /// Number of records held for a project.
    pub async fn count(&self, project: &str) -> Result<u64, StoreError> {
        let project = project.to_string();
        let db = Arc::clone(&self.db);

        run_blocking(move || {
            let conn = db.lock().expect("store mutex poisoned");
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM recorded_requests WHERE project = ?1",
                params![project],
                |row| row.get(0),
            )?;
            Ok(count.max(0) as u64)
        })
        .await
    }
}

/// Structural validation of query options, applied before any SQL is built.
fn validate_query_opts(opts: &QueryOpts) -> Result<(), StoreError> {
    if let Some(limit) = opts.limit {
        if limit == 0 {
            return Err(StoreError::InvalidQuery(
                "limit must be at least 1".to_string(),
            ));
        }
    }
    if let Some(keys) = &opts.sort {
        for key in keys {
            if !SORTABLE_FIELDS.contains(&key.field.as_str()) {
                return Err(StoreError::InvalidQuery(format!(
                    "unknown sort field '{}'",
                    key.field
                )));
            }
        }
    }
    Ok(())
}

async fn run_blocking<T, F>(f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| StoreError::Storage(anyhow::anyhow!("store task failed: {err}")))?
}
