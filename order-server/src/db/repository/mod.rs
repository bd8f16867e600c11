//! Repository Module
//!
//! Free functions for SQLite CRUD via sqlx. Functions that participate in a
//! service-level transaction take `&mut SqliteConnection` so callers can pass
//! either a pooled connection or an open transaction; plain reads take the
//! pool directly.

pub mod inventory;
pub mod order;
pub mod outbox;
pub mod payment;
pub mod product;
pub mod reservation;

use shared::error::{AppError, ErrorCode};
use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepoError::NotFound("Record not found".into()),
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message().to_string();
                if msg.contains("UNIQUE constraint failed") {
                    RepoError::Duplicate(msg)
                } else if msg.contains("FOREIGN KEY constraint failed")
                    || msg.contains("CHECK constraint failed")
                {
                    RepoError::Validation(msg)
                } else {
                    RepoError::Database(msg)
                }
            }
            sqlx::Error::PoolTimedOut => {
                RepoError::Database("connection pool exhausted".to_string())
            }
            _ => RepoError::Database(err.to_string()),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(msg) => AppError::with_message(ErrorCode::NotFound, msg),
            RepoError::Duplicate(msg) => AppError::with_message(ErrorCode::AlreadyExists, msg),
            RepoError::Database(msg) if msg.contains("pool exhausted") => {
                AppError::with_message(ErrorCode::ResourceExhausted, msg)
            }
            // Writer contention in SQLite surfaces as busy/locked; that is a
            // transient condition the caller may retry, not an internal fault
            RepoError::Database(msg) if is_busy_message(&msg) => {
                AppError::with_message(ErrorCode::Unavailable, msg)
            }
            RepoError::Database(msg) => AppError::database(msg),
            RepoError::Validation(msg) => AppError::validation(msg),
        }
    }
}

fn is_busy_message(msg: &str) -> bool {
    let msg = msg.to_lowercase();
    msg.contains("database is locked") || msg.contains("snapshot") || msg.contains("busy")
}

impl RepoError {
    /// Whether this error is a UNIQUE constraint violation
    pub fn is_duplicate(&self) -> bool {
        matches!(self, RepoError::Duplicate(_))
    }

    /// Whether this error is writer contention (busy/locked/stale snapshot)
    pub fn is_contention(&self) -> bool {
        matches!(self, RepoError::Database(msg) if is_busy_message(msg))
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;
