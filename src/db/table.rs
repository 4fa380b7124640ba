//! Static table metadata and output column specs

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::escape::safe_name;
use super::row::Guid;
use super::sql::Filter;
use crate::{Error, Result};

/// How a column gets filled when the caller does not supply it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Populate {
    /// Fresh v4 UUID, written back into the row
    Uuid,
    /// Current UTC time, written back into the row
    Now,
    /// Raw SQL expression evaluated by the store
    Expr(&'static str),
}

/// Static description of one database table
///
/// Descriptors are declared once per entity as constants:
///
/// ```
/// use casebook::db::{Populate, TableDescriptor};
///
/// const ITEM_TABLE: TableDescriptor = TableDescriptor::new("item")
///     .title_col("name")
///     .sort_order(&["name"])
///     .deleted_flag()
///     .populate_on_insert(&[("id", Populate::Uuid)]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDescriptor {
    pub table: &'static str,
    pub pk_col: &'static str,
    pub title_col: Option<&'static str>,
    pub sort_order: &'static [&'static str],
    /// The table has a boolean `deleted` column; reads skip flagged rows
    pub deleted_flag: bool,
    pub populate_on_insert: &'static [(&'static str, Populate)],
    pub populate_on_update: &'static [(&'static str, Populate)],
}

impl TableDescriptor {
    pub const fn new(table: &'static str) -> Self {
        Self {
            table,
            pk_col: "id",
            title_col: None,
            sort_order: &[],
            deleted_flag: false,
            populate_on_insert: &[],
            populate_on_update: &[],
        }
    }

    pub const fn pk_col(mut self, col: &'static str) -> Self {
        self.pk_col = col;
        self
    }

    pub const fn title_col(mut self, col: &'static str) -> Self {
        self.title_col = Some(col);
        self
    }

    pub const fn sort_order(mut self, cols: &'static [&'static str]) -> Self {
        self.sort_order = cols;
        self
    }

    pub const fn deleted_flag(mut self) -> Self {
        self.deleted_flag = true;
        self
    }

    pub const fn populate_on_insert(mut self, rules: &'static [(&'static str, Populate)]) -> Self {
        self.populate_on_insert = rules;
        self
    }

    pub const fn populate_on_update(mut self, rules: &'static [(&'static str, Populate)]) -> Self {
        self.populate_on_update = rules;
        self
    }

    /// Filter matching one row by primary key
    pub fn pk_filter(&self, id: &Guid) -> Filter {
        Filter::by(self.pk_col, Value::String(id.clone()))
    }

    /// Default ORDER BY for reads that do not ask for one
    pub fn default_sort(&self) -> Option<SortOrder> {
        if self.sort_order.is_empty() {
            return None;
        }
        Some(SortOrder::Columns(
            self.sort_order.iter().map(|c| c.to_string()).collect(),
        ))
    }
}

/// Sort order: raw SQL, or column names where a trailing `!` means DESC
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortOrder {
    Raw(String),
    Columns(Vec<String>),
}

impl SortOrder {
    pub fn columns(cols: &[&str]) -> Self {
        SortOrder::Columns(cols.iter().map(|c| c.to_string()).collect())
    }

    /// Render the ORDER BY body (without the keywords)
    pub fn to_clause(&self) -> Result<Option<String>> {
        match self {
            SortOrder::Raw(sql) if sql.trim().is_empty() => Ok(None),
            SortOrder::Raw(sql) => Ok(Some(sql.clone())),
            SortOrder::Columns(cols) if cols.is_empty() => Ok(None),
            SortOrder::Columns(cols) => {
                let parts = cols
                    .iter()
                    .map(|col| {
                        let col = col.trim_end();
                        match col.strip_suffix('!') {
                            Some(desc) => Ok(format!("{} DESC", safe_name(desc)?)),
                            None => Ok(format!("{} ASC", safe_name(col)?)),
                        }
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Some(parts.join(", ")))
            }
        }
    }
}

/// Transformer applied to one output column of every fetched row
pub type ValueProcessor = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// A named output column backed by a raw SQL expression
#[derive(Clone)]
pub struct ColumnExpr {
    pub out_col: String,
    pub expr: String,
    pub post_process: Option<ValueProcessor>,
}

impl fmt::Debug for ColumnExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnExpr")
            .field("out_col", &self.out_col)
            .field("expr", &self.expr)
            .field("post_process", &self.post_process.is_some())
            .finish()
    }
}

/// A derived column resolved through a foreign key into another table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLookup {
    pub table: String,
    pub pk_col: String,
    pub fk_col: String,
    pub out_col: String,
    pub source_col: String,
}

/// One entry of a read's projection list
#[derive(Debug, Clone)]
pub enum Column {
    /// A column of the queried table, read through its `t` alias
    Named(String),
    /// `*`
    All,
    /// `alias.*` for a joined table
    AllOf(String),
    Expr(ColumnExpr),
    Lookup(ColumnLookup),
}

impl Column {
    pub fn named(name: &str) -> Self {
        Column::Named(name.to_string())
    }

    pub fn expr(out_col: &str, expr: &str) -> Self {
        Column::Expr(ColumnExpr {
            out_col: out_col.to_string(),
            expr: expr.to_string(),
            post_process: None,
        })
    }

    pub fn expr_with(
        out_col: &str,
        expr: &str,
        post_process: impl Fn(Value) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Column::Expr(ColumnExpr {
            out_col: out_col.to_string(),
            expr: expr.to_string(),
            post_process: Some(Arc::new(post_process)),
        })
    }

    /// Name of this column in fetched rows, if it yields exactly one
    pub fn out_name(&self) -> Option<&str> {
        match self {
            Column::Named(name) => Some(name.as_str()),
            Column::Expr(ce) => Some(ce.out_col.as_str()),
            Column::Lookup(lu) => Some(lu.out_col.as_str()),
            Column::All | Column::AllOf(_) => None,
        }
    }

    /// SQL for this entry of the projection list
    pub fn to_sql(&self) -> Result<String> {
        match self {
            Column::Named(name) => Ok(format!("t.{}", safe_name(name)?)),
            Column::All => Ok("*".to_string()),
            Column::AllOf(alias) => Ok(format!("{}.*", safe_name(alias)?)),
            Column::Expr(ce) => Ok(format!("({}) AS {}", ce.expr, safe_name(&ce.out_col)?)),
            Column::Lookup(lu) => Ok(format!(
                "(SELECT {} FROM {} WHERE {} = t.{}) AS {}",
                safe_name(&lu.source_col)?,
                safe_name(&lu.table)?,
                safe_name(&lu.pk_col)?,
                safe_name(&lu.fk_col)?,
                safe_name(&lu.out_col)?,
            )),
        }
    }
}

/// Build a lookup column into `table`
///
/// Defaults: the foreign key is `<table>_id`, the looked-up column is the
/// table's title column, and the output is `<table>_<source_col>`.
pub fn lookup_col(
    table: &TableDescriptor,
    fk_col: Option<&str>,
    out_col: Option<&str>,
    source_col: Option<&str>,
) -> Result<Column> {
    let source_col = source_col.or(table.title_col).ok_or_else(|| {
        Error::InvalidRequest(format!(
            "{} table definition is missing a title column",
            table.table
        ))
    })?;
    let fk_col = fk_col
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}_id", table.table));
    let out_col = out_col
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}_{}", table.table, source_col).replacen("__", "_", 1));

    Ok(Column::Lookup(ColumnLookup {
        table: table.table.to_string(),
        pk_col: table.pk_col.to_string(),
        fk_col,
        out_col,
        source_col: source_col.to_string(),
    }))
}

/// Run every registered post-processor over the fetched rows
pub fn apply_post_processors(columns: &[Column], rows: &mut [Map<String, Value>]) -> Result<()> {
    let processors: Vec<(&str, &ValueProcessor)> = columns
        .iter()
        .filter_map(|col| match col {
            Column::Expr(ColumnExpr {
                out_col,
                post_process: Some(p),
                ..
            }) => Some((out_col.as_str(), p)),
            _ => None,
        })
        .collect();
    if processors.is_empty() {
        return Ok(());
    }

    for row in rows.iter_mut() {
        for (out_col, process) in &processors {
            let value = row.get(*out_col).cloned().unwrap_or(Value::Null);
            row.insert(out_col.to_string(), process(value)?);
        }
    }
    Ok(())
}
