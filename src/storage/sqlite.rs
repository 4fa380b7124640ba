//! SQLite storage implementation

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Batch, Connection, OptionalExtension};
use serde_json::Value;

use super::Executor;
use crate::db::{DbSet, Row};
use crate::{Error, Result};

/// Column marking the next result table's name
const NAME_MARKER: &str = "_name";

/// SQLite-backed store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        Self::configure(Connection::open(path)?)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::configure(Connection::open_in_memory()?)
    }

    fn configure(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        register_lower(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement leaves nothing half-applied on the connection
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the rows of a table
    pub fn count_rows(&self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", crate::db::safe_name(table)?);
        let count: i64 = self
            .conn()
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|e| Error::query(e, &sql))?;
        Ok(count.max(0) as u64)
    }
}

impl Executor for SqliteStore {
    fn query_tables(&self, sql: &str) -> Result<DbSet> {
        let conn = self.conn();
        let mut batch = Batch::new(&conn, sql);
        let mut set = DbSet::new();
        let mut pending_name: Option<String> = None;

        while let Some(mut stmt) = batch.next().map_err(|e| Error::query(e, sql))? {
            let columns: Vec<(String, bool)> = stmt
                .columns()
                .iter()
                .map(|c| (c.name().to_string(), is_boolean(c.decl_type())))
                .collect();

            if columns.is_empty() {
                stmt.execute([]).map_err(|e| Error::query(e, sql))?;
                set.push(pending_name.take(), Vec::new());
                continue;
            }

            let mut rows = Vec::new();
            let mut cursor = stmt.query([]).map_err(|e| Error::query(e, sql))?;
            while let Some(found) = cursor.next().map_err(|e| Error::query(e, sql))? {
                let mut row = Row::new();
                for (i, (name, boolean)) in columns.iter().enumerate() {
                    let value = found.get_ref(i).map_err(|e| Error::query(e, sql))?;
                    row.insert(name.clone(), to_json(value, *boolean));
                }
                rows.push(row);
            }

            if columns.len() == 1 && columns[0].0 == NAME_MARKER {
                pending_name = rows
                    .first()
                    .and_then(|r| r.get(NAME_MARKER))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                continue;
            }
            set.push(pending_name.take(), rows);
        }

        tracing::trace!(tables = set.len(), "query finished");
        Ok(set)
    }

    fn execute(&self, sql: &str) -> Result<usize> {
        self.conn()
            .execute(sql, [])
            .map_err(|e| Error::query(e, sql))
    }

    fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn()
            .execute_batch(sql)
            .map_err(|e| Error::query(e, sql))
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        let found = self
            .conn()
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

/// Replace the built-in ASCII-only `LOWER()` with full Unicode folding so
/// column text folds the same way as search terms
fn register_lower(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "lower",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            Ok(match ctx.get_raw(0) {
                ValueRef::Text(text) => SqlValue::Text(String::from_utf8_lossy(text).to_lowercase()),
                other => SqlValue::from(other),
            })
        },
    )
}

fn is_boolean(decl_type: Option<&str>) -> bool {
    decl_type.is_some_and(|t| t.eq_ignore_ascii_case("BOOLEAN") || t.eq_ignore_ascii_case("BOOL"))
}

/// Convert one SQLite value to JSON; BOOLEAN-declared integers become bools
fn to_json(value: ValueRef<'_>, boolean: bool) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) if boolean => Value::Bool(i != 0),
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(text) => Value::String(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    }
}
