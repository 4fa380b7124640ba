//! # Casebook - case-management data service
//!
//! Advocates track encounters and notes with their clients. Every read and
//! write goes through one small data-access layer:
//! - Declarative query engine (table descriptors, filters, derived columns,
//!   paging) that renders escaped SQL and maps rows back into typed records
//! - Linear migration runner with forward/backward scripts and a checkpoint
//! - SQLite-backed store behind an injectable executor seam
//! - Thin services and HTTP handlers over the entity tables

pub mod config;
pub mod db;
pub mod entities;
pub mod migrations;
pub mod server;
pub mod services;
pub mod storage;
pub mod ui;

// Re-exports for convenient access
pub use db::{Filter, PagedRowset, QueryEngine, Row, TableDescriptor};
pub use migrations::{MigrationRegistry, MigrationRunner, MigrationTarget};
pub use storage::{Executor, SqliteStore};

/// Result type alias for Casebook operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Casebook operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid DB identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("No such table as '{0}'")]
    NotFound(String),

    #[error("SQL error: {message}:\n\n{sql}")]
    Query { message: String, sql: String },

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl Error {
    /// Wrap a driver failure together with the statement that caused it
    pub fn query(err: impl std::fmt::Display, sql: &str) -> Self {
        Error::Query {
            message: err.to_string(),
            sql: db::sql::tidy(sql),
        }
    }

    /// Whether the caller sent something the engine refuses to run
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidIdentifier(_) | Error::InvalidRequest(_))
    }
}
