//! Pure SQL text builders
//!
//! Nothing here touches the store: each function turns a declarative
//! request into statement text, which keeps the generated SQL easy to test.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;

use super::escape::{safe_name, safe_value, timestamp_text};
use super::row::Row;
use super::table::{Column, Populate, SortOrder, TableDescriptor};
use crate::{Error, Result};

/// Alias of the queried table in every generated read
pub const TABLE_ALIAS: &str = "t";

static TRIVIAL_TRUE: OnceLock<Regex> = OnceLock::new();

fn trivial_true() -> &'static Regex {
    TRIVIAL_TRUE.get_or_init(|| {
        Regex::new(r"(?i)(^|[\s(])1\s*=\s*1[ \t\r\n]*AND\b").expect("trivial predicate pattern")
    })
}

/// Row filter of a read or mutation
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Filter {
    #[default]
    None,
    /// A ready-made boolean SQL predicate
    Raw(String),
    /// Exact-match column values; nulls match `IS NULL`
    Columns(Row),
}

impl Filter {
    pub fn raw(sql: impl Into<String>) -> Self {
        Filter::Raw(sql.into())
    }

    /// Single-column exact match
    pub fn by(col: &str, value: impl Into<Value>) -> Self {
        let mut row = Row::new();
        row.insert(col.to_string(), value.into());
        Filter::Columns(row)
    }

    /// Add another exact match; turns an absent filter into a column filter
    pub fn and(self, col: &str, value: impl Into<Value>) -> Self {
        let mut row = match self {
            Filter::Columns(row) => row,
            Filter::None => Row::new(),
            Filter::Raw(sql) => {
                // Quote-escaped so no name can break out of the identifier
                let col = format!("\"{}\"", col.replace('"', "\"\""));
                let term = match value.into() {
                    Value::Null => format!("{} IS NULL", col),
                    value => format!("{} = {}", col, safe_value(&value)),
                };
                return Filter::Raw(format!("({}) AND {}", sql, term));
            }
        };
        row.insert(col.to_string(), value.into());
        Filter::Columns(row)
    }

    /// Add an exact match only when a value is present
    pub fn and_some<V: Into<Value>>(self, col: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.and(col, v),
            None => self,
        }
    }
}

impl From<Row> for Filter {
    fn from(row: Row) -> Self {
        Filter::Columns(row)
    }
}

/// Everything a read needs besides the table itself
#[derive(Debug, Clone, Default)]
pub struct FetchRequest {
    /// Raw JOIN clauses placed after `FROM table t`
    pub joins: Option<String>,
    pub filter: Filter,
    /// Supplementary predicate ANDed with the filter
    pub also_where: Option<String>,
    /// Read soft-deleted rows too
    pub include_deleted: bool,
    /// Falls back to the table's default sort when absent
    pub order: Option<SortOrder>,
    /// Falls back to `*` when absent
    pub columns: Option<Vec<Column>>,
    pub skip: Option<u64>,
    pub take: Option<u64>,
    pub with_count: bool,
    /// Log the generated SQL at debug level
    pub debug: bool,
}

impl FetchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn joins(mut self, joins: impl Into<String>) -> Self {
        self.joins = Some(joins.into());
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn also_where(mut self, predicate: impl Into<String>) -> Self {
        self.also_where = Some(predicate.into());
        self
    }

    pub fn include_deleted(mut self, include: bool) -> Self {
        self.include_deleted = include;
        self
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = Some(order);
        self
    }

    pub fn columns(mut self, columns: Vec<Column>) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn skip(mut self, skip: Option<u64>) -> Self {
        self.skip = skip;
        self
    }

    pub fn take(mut self, take: Option<u64>) -> Self {
        self.take = take;
        self
    }

    pub fn with_count(mut self) -> Self {
        self.with_count = true;
        self
    }

    pub fn debug(mut self) -> Self {
        self.debug = true;
        self
    }
}

/// Statement text for one read
#[derive(Debug, Clone, PartialEq)]
pub struct SelectSql {
    pub sql: String,
    /// `SELECT COUNT(*)` over the same FROM/JOIN/WHERE, when requested
    pub count_sql: Option<String>,
}

fn equality_term(prefix: Option<&str>, col: &str, value: &Value) -> Result<String> {
    let col = match prefix {
        Some(prefix) => format!("{}.{}", prefix, safe_name(col)?),
        None => safe_name(col)?,
    };
    Ok(match value {
        Value::Null => format!("{} IS NULL", col),
        value => format!("{} = {}", col, safe_value(value)),
    })
}

/// Remove `1=1 AND` noise outside of string literals
pub fn strip_trivial_true(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut segment = String::new();
    let mut in_literal = false;
    for ch in sql.chars() {
        if ch == '\'' {
            if in_literal {
                segment.push(ch);
                out.push_str(&segment);
            } else {
                out.push_str(&trivial_true().replace_all(&segment, "$1"));
                out.push(ch);
            }
            segment.clear();
            in_literal = !in_literal;
            continue;
        }
        segment.push(ch);
    }
    if in_literal {
        out.push_str(&segment);
    } else {
        out.push_str(&trivial_true().replace_all(&segment, "$1"));
    }
    out
}

/// Translate a filter plus supplementary predicate into a WHERE body
///
/// Column filters on soft-delete tables gain `deleted = FALSE` unless the
/// filter mentions `deleted` itself or `include_deleted` is set. With
/// `require_one`, a column filter must name at least one column of its own.
pub fn filters_to_where(
    filter: &Filter,
    also_where: Option<&str>,
    include_deleted: bool,
    table: &TableDescriptor,
    prefix: Option<&str>,
    require_one: bool,
    indent: &str,
) -> Result<String> {
    let also = also_where
        .filter(|s| !s.trim().is_empty())
        .map(|s| format!("\n AND ({})", s));

    let where_clause = match filter {
        Filter::Raw(sql) => match also {
            Some(also) => format!("(\n{})\n{}", sql, also),
            None => sql.clone(),
        },
        Filter::None | Filter::Columns(_) => {
            let mut filters = match filter {
                Filter::Columns(row) => row.clone(),
                _ => Row::new(),
            };
            if require_one && filters.is_empty() {
                return Err(Error::InvalidRequest(
                    "Expecting at least one column to filter by".to_string(),
                ));
            }
            if table.deleted_flag && !include_deleted && !filters.contains_key("deleted") {
                filters.insert("deleted".to_string(), Value::Bool(false));
            }

            let terms = filters
                .iter()
                .map(|(col, value)| equality_term(prefix, col, value))
                .collect::<Result<Vec<_>>>()?;
            let mut clause = if terms.is_empty() {
                "1=1".to_string()
            } else {
                terms.join(&format!("\n{}AND ", indent))
            };
            if let Some(also) = also {
                clause = format!("(\n{})\n{}", clause, also);
            }
            clause
        }
    };

    Ok(strip_trivial_true(&where_clause))
}

/// Build the SELECT (and optional COUNT) for a read
pub fn build_select(table: &TableDescriptor, req: &FetchRequest) -> Result<SelectSql> {
    let projection = match &req.columns {
        Some(cols) if !cols.is_empty() => cols
            .iter()
            .map(Column::to_sql)
            .collect::<Result<Vec<_>>>()?
            .join(", "),
        _ => "*".to_string(),
    };

    let where_clause = filters_to_where(
        &req.filter,
        req.also_where.as_deref(),
        req.include_deleted,
        table,
        Some(TABLE_ALIAS),
        false,
        "",
    )?;

    let order = match &req.order {
        Some(order) => Some(order.clone()),
        None => table.default_sort(),
    };
    let order_clause = match order {
        Some(order) => order.to_clause()?,
        None => None,
    };

    let core_sql = format!(
        "FROM {} {}\n{}\nWHERE {}",
        safe_name(table.table)?,
        TABLE_ALIAS,
        req.joins.as_deref().unwrap_or(""),
        where_clause
    );

    let mut sql = format!("SELECT {}\n{}", projection, core_sql);
    if let Some(order_clause) = order_clause {
        sql.push_str(&format!("\nORDER BY {}", order_clause));
    }
    sql.push_str(&limit_clause(req.skip, req.take));

    let count_sql = req
        .with_count
        .then(|| format!("SELECT COUNT(*)\n{}", core_sql));

    Ok(SelectSql { sql, count_sql })
}

fn limit_clause(skip: Option<u64>, take: Option<u64>) -> String {
    let take = take.filter(|t| *t > 0);
    let skip = skip.filter(|s| *s > 0);
    match (take, skip) {
        (Some(take), Some(skip)) => format!("\nLIMIT {} OFFSET {}", take, skip),
        (Some(take), None) => format!("\nLIMIT {}", take),
        // SQLite only accepts OFFSET after a LIMIT
        (None, Some(skip)) => format!("\nLIMIT -1 OFFSET {}", skip),
        (None, None) => String::new(),
    }
}

/// Value expression for one column: explicit value first, then the
/// population rule, whose generated value is written back into `row`
fn column_value(
    col: &str,
    row: &mut Row,
    rules: &[(&'static str, Populate)],
    now: &DateTime<Utc>,
) -> String {
    if let Some(value) = row.get(col) {
        return safe_value(value);
    }
    let rule = rules.iter().find(|(name, _)| *name == col).map(|(_, rule)| *rule);
    match rule {
        Some(Populate::Uuid) => {
            let value = Value::String(uuid::Uuid::new_v4().to_string());
            let sql = safe_value(&value);
            row.insert(col.to_string(), value);
            sql
        }
        Some(Populate::Now) => {
            let value = Value::String(timestamp_text(now));
            let sql = safe_value(&value);
            row.insert(col.to_string(), value);
            sql
        }
        Some(Populate::Expr(expr)) => format!("({})", expr),
        None => "NULL".to_string(),
    }
}

/// Explicit columns followed by rule columns the caller left out
fn affected_columns(row: &Row, rules: &[(&'static str, Populate)]) -> Vec<String> {
    let mut cols: Vec<String> = row.keys().cloned().collect();
    for (name, _) in rules {
        if !row.contains_key(*name) {
            cols.push(name.to_string());
        }
    }
    cols
}

/// Build an INSERT, filling populated columns into `values`
pub fn build_insert(table: &TableDescriptor, values: &mut Row, now: &DateTime<Utc>) -> Result<String> {
    let cols = affected_columns(values, table.populate_on_insert);
    if cols.is_empty() {
        return Ok(format!("INSERT INTO {} DEFAULT VALUES", safe_name(table.table)?));
    }

    let names = cols
        .iter()
        .map(|c| safe_name(c))
        .collect::<Result<Vec<_>>>()?
        .join(", ");
    let exprs = cols
        .iter()
        .map(|c| format!("/* {} */ {}", c.replace("*/", "* /"), column_value(c, values, table.populate_on_insert, now)))
        .collect::<Vec<_>>()
        .join(",\n    ");

    Ok(format!(
        "INSERT INTO {} (\n    {}\n) VALUES (\n    {}\n)",
        safe_name(table.table)?,
        names,
        exprs
    ))
}

/// Build an UPDATE of every row matching the filter
pub fn build_update(
    table: &TableDescriptor,
    filter: &Filter,
    also_where: Option<&str>,
    values: &mut Row,
    include_deleted: bool,
    now: &DateTime<Utc>,
) -> Result<String> {
    let where_clause = filters_to_where(filter, also_where, include_deleted, table, None, true, "    ")?;
    let cols = affected_columns(values, table.populate_on_update);
    if cols.is_empty() {
        return Err(Error::InvalidRequest("No columns to update".to_string()));
    }
    let sets = cols
        .iter()
        .map(|c| Ok(format!("{} = {}", safe_name(c)?, column_value(c, values, table.populate_on_update, now))))
        .collect::<Result<Vec<_>>>()?
        .join(",\n    ");

    Ok(format!(
        "UPDATE {} SET\n    {}\nWHERE {}",
        safe_name(table.table)?,
        sets,
        where_clause
    ))
}

/// Build a DELETE of every row matching the filter
pub fn build_delete(
    table: &TableDescriptor,
    filter: &Filter,
    also_where: Option<&str>,
    include_deleted: bool,
) -> Result<String> {
    let where_clause = filters_to_where(filter, also_where, include_deleted, table, None, true, "    ")?;
    Ok(format!("DELETE FROM {}\nWHERE {}", safe_name(table.table)?, where_clause))
}

/// Statement text cleaned up for error messages: blank lines and common
/// space/tab indentation removed
pub fn tidy(sql: &str) -> String {
    let lines: Vec<&str> = sql
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect();
    let indent = lines
        .iter()
        .map(|l| l.len() - l.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|l| &l[indent..])
        .collect::<Vec<_>>()
        .join("\n")
}
