//! Storage Layer - the executor seam and its SQLite implementation
//!
//! Everything above this module talks to the database through [`Executor`],
//! so tests and services can swap the backing store freely.

pub mod sqlite;

pub use sqlite::SqliteStore;

use crate::Result;
use crate::db::DbSet;

/// Runs raw SQL text against a store
pub trait Executor: Send + Sync {
    /// Run SQL text (possibly several statements) and collect every result table
    fn query_tables(&self, sql: &str) -> Result<DbSet>;

    /// Run a single statement and return the number of rows it changed
    fn execute(&self, sql: &str) -> Result<usize>;

    /// Run several statements, discarding any results
    fn execute_batch(&self, sql: &str) -> Result<()>;

    /// Whether a table with this name exists
    fn table_exists(&self, table: &str) -> Result<bool>;
}
