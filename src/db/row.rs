//! Row and result-set shapes shared by the engine and the store

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

pub type Guid = String;

pub const EMPTY_GUID: &str = "00000000-0000-0000-0000-000000000000";

/// One fetched row, keyed by output column name
pub type Row = serde_json::Map<String, Value>;

/// Which table of a multi-statement result to read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSelector {
    First,
    Index(usize),
    Name(String),
}

impl TableSelector {
    fn describe(&self) -> String {
        match self {
            TableSelector::First => "0".to_string(),
            TableSelector::Index(i) => i.to_string(),
            TableSelector::Name(name) => name.clone(),
        }
    }
}

impl From<&str> for TableSelector {
    fn from(name: &str) -> Self {
        TableSelector::Name(name.to_string())
    }
}

impl From<usize> for TableSelector {
    fn from(index: usize) -> Self {
        TableSelector::Index(index)
    }
}

/// Every result table produced by one SQL text, in statement order
///
/// A statement that yields a single `_name` column names the table that
/// follows it:
///
/// ```sql
/// SELECT 'AllUsers' AS _name;
/// SELECT * FROM user_;
/// ```
///
/// Unnamed tables are called `t0`, `t1`, ... by their position among the
/// tables produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbSet {
    tables: Vec<(String, Vec<Row>)>,
}

impl DbSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the rows of one statement, honoring a pending `_name` marker
    pub fn push(&mut self, name: Option<String>, rows: Vec<Row>) {
        let name = name.unwrap_or_else(|| format!("t{}", self.tables.len()));
        self.tables.push((name, rows));
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|(name, _)| name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&[Row]> {
        self.tables
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, rows)| rows.as_slice())
    }

    /// Take one table out of the set, or fail with `NotFound`
    pub fn take(mut self, selector: &TableSelector) -> Result<Vec<Row>> {
        let position = match selector {
            TableSelector::First => (!self.tables.is_empty()).then_some(0),
            TableSelector::Index(i) => (*i < self.tables.len()).then_some(*i),
            TableSelector::Name(name) => self.tables.iter().position(|(n, _)| n == name),
        };
        match position {
            Some(i) => Ok(self.tables.swap_remove(i).1),
            None => Err(Error::NotFound(selector.describe())),
        }
    }
}

/// A page of rows plus the total row count ignoring the page window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagedRowset<T> {
    pub rows: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

impl<T> PagedRowset<T> {
    pub fn empty() -> Self {
        Self {
            rows: Vec::new(),
            count: Some(0),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedRowset<U> {
        PagedRowset {
            rows: self.rows.into_iter().map(f).collect(),
            count: self.count,
        }
    }

    pub fn try_map<U>(self, f: impl FnMut(T) -> Result<U>) -> Result<PagedRowset<U>> {
        Ok(PagedRowset {
            rows: self.rows.into_iter().map(f).collect::<Result<Vec<_>>>()?,
            count: self.count,
        })
    }
}

/// Serialize a typed record into a row, dropping unset (`None`) fields
pub fn to_row<T: Serialize>(record: &T) -> Result<Row> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map.into_iter().filter(|(_, v)| !v.is_null()).collect()),
        other => Err(Error::InvalidRequest(format!(
            "expected a record with named fields, got {}",
            other
        ))),
    }
}

/// Deserialize a fetched row into a typed record
pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_unnamed_tables_are_numbered_by_position() {
        let mut set = DbSet::new();
        set.push(Some("Users".to_string()), vec![row(json!({"id": 1}))]);
        set.push(None, vec![]);
        let names: Vec<_> = set.names().collect();
        assert_eq!(names, vec!["Users", "t1"]);
    }

    #[test]
    fn test_take_missing_table_is_not_found() {
        let mut set = DbSet::new();
        set.push(None, vec![]);
        assert!(matches!(set.clone().take(&"nope".into()), Err(Error::NotFound(_))));
        assert!(matches!(set.clone().take(&TableSelector::Index(3)), Err(Error::NotFound(_))));
        assert!(set.take(&TableSelector::First).unwrap().is_empty());
    }

    #[test]
    fn test_to_row_skips_none_fields() {
        #[derive(Serialize)]
        struct Partial {
            id: Option<String>,
            name: Option<String>,
        }
        let r = to_row(&Partial { id: None, name: Some("Amy".into()) }).unwrap();
        assert_eq!(r.len(), 1);
        assert_eq!(r["name"], json!("Amy"));
    }

    #[test]
    fn test_paged_rowset_empty_has_zero_count() {
        let page: PagedRowset<Row> = PagedRowset::empty();
        assert!(page.rows.is_empty());
        assert_eq!(page.count, Some(0));
    }
}
