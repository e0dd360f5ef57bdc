// src/storage/request_log.rs
use crate::utils::error::StorageError;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Processing,
    Done,
    Error,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Processing => "processing",
            RequestStatus::Done => "done",
            RequestStatus::Error => "error",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "processing" => Ok(RequestStatus::Processing),
            "done" => Ok(RequestStatus::Done),
            "error" => Ok(RequestStatus::Error),
            other => Err(StorageError::UnknownStatus(other.to_string())),
        }
    }
}

/// One row of `request_logs`.
#[derive(Debug, Clone, Serialize)]
pub struct RequestLog {
    pub id: i64,
    pub created_at: String,
    pub request_json: String,
    pub response_json: Option<String>,
    pub status: RequestStatus,
}

pub fn create_table(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS request_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%f', 'now')),
            request_json TEXT,
            response_json TEXT,
            status VARCHAR(50) NOT NULL DEFAULT 'pending'
        );",
    )?;
    Ok(())
}

/// Inserts a row for a request that is starting; returns its id.
pub fn create_log(conn: &Connection, request_json: &str, status: RequestStatus) -> Result<i64, StorageError> {
    conn.execute(
        "INSERT INTO request_logs (request_json, status) VALUES (?1, ?2)",
        params![request_json, status.as_str()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Records the terminal outcome of a request.
pub fn finish_log(conn: &Connection, id: i64, status: RequestStatus, response_json: &str) -> Result<(), StorageError> {
    let updated = conn.execute(
        "UPDATE request_logs SET status = ?1, response_json = ?2 WHERE id = ?3",
        params![status.as_str(), response_json, id],
    )?;
    if updated == 0 {
        return Err(StorageError::NotFound(id));
    }
    Ok(())
}

pub fn get_log(conn: &Connection, id: i64) -> Result<Option<RequestLog>, StorageError> {
    let row = conn
        .query_row(
            "SELECT id, created_at, request_json, response_json, status FROM request_logs WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()?;

    row.map(|(id, created_at, request_json, response_json, status)| {
        Ok::<_, StorageError>(RequestLog {
            id,
            created_at,
            request_json: request_json.unwrap_or_default(),
            response_json,
            status: status.parse()?,
        })
    })
    .transpose()
}
