// src/utils/error.rs
use std::path::PathBuf;
use thiserror::Error;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error), // Automatically convert reqwest errors

    #[error("Model server returned HTTP {0}: {1}")]
    Http(reqwest::StatusCode, String),

    #[error("Model server returned no choices")]
    EmptyResponse,

    #[error("Embedding count mismatch: sent {sent}, received {received}")]
    EmbeddingCount { sent: usize, received: usize },
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("PDF text extraction failed for {0}: {1}")]
    Pdf(PathBuf, String),

    #[error("Unsupported source type: {0}")]
    Unsupported(PathBuf),
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Index serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Another index build holds the lock at {0}")]
    Busy(PathBuf),

    #[error("Embedding failed: {0}")]
    Embedding(#[from] ModelError),

    #[error("Index worker failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown request status: {0}")]
    UnknownStatus(String),

    #[error("Request log {0} not found")]
    NotFound(i64),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No financial reports found in {0}")]
    NoReports(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("Language model call failed: {0}")]
    Model(#[from] ModelError),

    #[error("Semantic index error: {0}")]
    Index(#[from] IndexError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
