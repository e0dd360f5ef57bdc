// src/storage/mod.rs
pub mod request_log;

use crate::utils::error::StorageError;
use parking_lot::Mutex;
use request_log::{RequestLog, RequestStatus};
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};

/// Which database the store ended up on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    Primary(PathBuf),
    Fallback(PathBuf),
}

/// SQLite file named by a connection string: `sqlite://<path>`,
/// `sqlite:<path>`, or a bare path. Other schemes are not supported here.
pub fn sqlite_path_from_url(url: &str) -> Option<PathBuf> {
    let url = url.trim();
    let path = if let Some(rest) = url.strip_prefix("sqlite://") {
        rest
    } else if let Some(rest) = url.strip_prefix("sqlite:") {
        rest
    } else if url.contains("://") {
        return None;
    } else {
        url
    };
    (!path.is_empty()).then(|| PathBuf::from(path))
}

fn open_sqlite(path: &Path) -> Result<Connection, StorageError> {
    let conn = Connection::open(path)?;
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
    request_log::create_table(&conn)?;
    Ok(conn)
}

/// Request-log persistence over a single SQLite connection.
pub struct RequestLogStore {
    conn: Mutex<Connection>,
    target: DatabaseTarget,
}

impl RequestLogStore {
    /// Opens the configured database, falling back to the local file at
    /// `fallback_path` when the URL is unset, unsupported, or unreachable.
    pub fn open(database_url: Option<&str>, fallback_path: &Path) -> Result<Self, StorageError> {
        if let Some(url) = database_url {
            match sqlite_path_from_url(url) {
                Some(path) => match open_sqlite(&path) {
                    Ok(conn) => {
                        tracing::info!("Using database at {}", path.display());
                        return Ok(Self { conn: Mutex::new(conn), target: DatabaseTarget::Primary(path) });
                    }
                    Err(e) => tracing::warn!("Could not open database {}: {}. Falling back to local SQLite.", path.display(), e),
                },
                None => tracing::warn!("Unsupported DATABASE_URL scheme in '{}'. Falling back to local SQLite.", url),
            }
        }

        if let Some(parent) = fallback_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let conn = open_sqlite(fallback_path)?;
        tracing::info!("Using fallback SQLite DB at {}", fallback_path.display());
        Ok(Self { conn: Mutex::new(conn), target: DatabaseTarget::Fallback(fallback_path.to_path_buf()) })
    }

    pub fn target(&self) -> &DatabaseTarget {
        &self.target
    }

    /// Logs a request that is starting; the row is `processing` until finished.
    pub fn begin(&self, request_json: &str) -> Result<i64, StorageError> {
        let conn = self.conn.lock();
        request_log::create_log(&conn, request_json, RequestStatus::Processing)
    }

    pub fn complete(&self, id: i64, response_json: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        request_log::finish_log(&conn, id, RequestStatus::Done, response_json)
    }

    pub fn fail(&self, id: i64, error: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        request_log::finish_log(&conn, id, RequestStatus::Error, error)
    }

    pub fn get(&self, id: i64) -> Result<Option<RequestLog>, StorageError> {
        let conn = self.conn.lock();
        request_log::get_log(&conn, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_url_forms() {
        assert_eq!(sqlite_path_from_url("sqlite:///var/db/app.sqlite"), Some(PathBuf::from("/var/db/app.sqlite")));
        assert_eq!(sqlite_path_from_url("sqlite:local.db"), Some(PathBuf::from("local.db")));
        assert_eq!(sqlite_path_from_url("./db/app.sqlite"), Some(PathBuf::from("./db/app.sqlite")));
        assert_eq!(sqlite_path_from_url("mysql://user:pw@host/db"), None);
        assert_eq!(sqlite_path_from_url("sqlite://"), None);
    }

    #[test]
    fn test_primary_database_is_used_when_reachable() {
        let dir = tempfile::tempdir().unwrap();
        let primary = dir.path().join("primary.sqlite");
        let url = format!("sqlite://{}", primary.display());
        let store = RequestLogStore::open(Some(&url), &dir.path().join("fallback.sqlite")).unwrap();
        assert_eq!(store.target(), &DatabaseTarget::Primary(primary));
    }

    #[test]
    fn test_falls_back_when_unset_unsupported_or_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("nested").join("app_fallback.sqlite");
        let unreachable = dir.path().join("missing-dir").join("x.sqlite");
        let unreachable = unreachable.to_string_lossy().to_string();

        for url in [None, Some("mysql://user:pw@db.internal/forecast"), Some(unreachable.as_str())] {
            let store = RequestLogStore::open(url, &fallback).unwrap();
            assert_eq!(store.target(), &DatabaseTarget::Fallback(fallback.clone()));
        }
        assert!(fallback.exists());
    }

    #[test]
    fn test_begin_then_fail_records_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = RequestLogStore::open(None, &dir.path().join("log.sqlite")).unwrap();
        let id = store.begin(r#"{"company":"TCS"}"#).unwrap();
        assert_eq!(store.get(id).unwrap().unwrap().status, RequestStatus::Processing);

        store.fail(id, "model server unreachable").unwrap();
        let row = store.get(id).unwrap().unwrap();
        assert_eq!(row.status, RequestStatus::Error);
        assert_eq!(row.response_json.as_deref(), Some("model server unreachable"));
    }
}
