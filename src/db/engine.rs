//! Query engine implementation
//!
//! Provides the declarative data-access operations:
//! - Paged reads with derived columns, total counts and post-processing
//! - Single-row and scalar reads
//! - Insert with populated columns, update/delete by filter, upsert
//! - Raw multi-statement queries with named result tables

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::row::{DbSet, PagedRowset, Row, TableSelector, from_row, to_row};
use super::sql::{self, FetchRequest, Filter};
use super::table::{Column, TableDescriptor, apply_post_processors};
use crate::storage::Executor;
use crate::{Error, Result};

/// Query engine over an injected store
pub struct QueryEngine<'a> {
    store: &'a dyn Executor,
}

impl<'a> QueryEngine<'a> {
    /// Create a new query engine
    pub fn new(store: &'a dyn Executor) -> Self {
        Self { store }
    }

    // ========== Raw Queries ==========

    /// Run SQL text and return every result table it produced
    pub fn query_tables(&self, sql: &str) -> Result<DbSet> {
        self.store.query_tables(sql)
    }

    /// Run SQL text and return one of its result tables
    pub fn query_table(&self, sql: &str, selector: &TableSelector) -> Result<Vec<Row>> {
        self.query_tables(sql)?.take(selector)
    }

    /// First row of one result table, if any
    pub fn query_row(&self, sql: &str, selector: &TableSelector) -> Result<Option<Row>> {
        Ok(self.query_table(sql, selector)?.into_iter().next())
    }

    /// First column of the first row of one result table, if any
    pub fn query_scalar(&self, sql: &str, selector: &TableSelector) -> Result<Option<Value>> {
        Ok(self
            .query_row(sql, selector)?
            .and_then(|row| row.into_iter().next().map(|(_, value)| value)))
    }

    /// Execute a single statement and return the affected row count
    pub fn execute(&self, sql: &str) -> Result<usize> {
        self.store.execute(sql)
    }

    /// Run a script of statements, discarding any results
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.store.execute_batch(sql)
    }

    // ========== Reads ==========

    /// Fetch a page of rows, optionally with the total row count
    pub fn fetch_page(&self, table: &TableDescriptor, req: &FetchRequest) -> Result<PagedRowset<Row>> {
        let select = sql::build_select(table, req)?;
        if req.debug {
            tracing::debug!(table = table.table, "\n----------\n{}\n----------", select.sql);
        } else {
            tracing::trace!(table = table.table, "{}", select.sql);
        }

        let mut rows = self.query_table(&select.sql, &TableSelector::First)?;

        let count = match &select.count_sql {
            Some(count_sql) => Some(self.count(count_sql)?),
            None => None,
        };

        if let Some(columns) = &req.columns {
            apply_post_processors(columns, &mut rows)?;
        }

        Ok(PagedRowset { rows, count })
    }

    /// Fetch a page of rows as typed records
    pub fn fetch_page_as<T: DeserializeOwned>(
        &self,
        table: &TableDescriptor,
        req: &FetchRequest,
    ) -> Result<PagedRowset<T>> {
        self.fetch_page(table, req)?.try_map(from_row)
    }

    /// Fetch the first matching row; no match is not an error
    pub fn fetch_one(&self, table: &TableDescriptor, req: &FetchRequest) -> Result<Option<Row>> {
        let mut req = req.clone();
        req.take = Some(1);
        req.with_count = false;
        Ok(self.fetch_page(table, &req)?.rows.into_iter().next())
    }

    /// Fetch the first matching row as a typed record
    pub fn fetch_one_as<T: DeserializeOwned>(
        &self,
        table: &TableDescriptor,
        req: &FetchRequest,
    ) -> Result<Option<T>> {
        self.fetch_one(table, req)?.map(from_row).transpose()
    }

    /// Fetch one column of the first matching row
    ///
    /// Without a column, the first column of `*` is returned.
    pub fn fetch_scalar(
        &self,
        table: &TableDescriptor,
        req: &FetchRequest,
        column: Option<Column>,
    ) -> Result<Option<Value>> {
        let out_name = column.as_ref().and_then(|c| c.out_name().map(str::to_string));
        let mut req = req.clone();
        req.columns = column.map(|c| vec![c]);

        let Some(mut row) = self.fetch_one(table, &req)? else {
            return Ok(None);
        };
        Ok(match out_name {
            Some(name) => row.remove(&name),
            None => row.into_iter().next().map(|(_, value)| value),
        })
    }

    fn count(&self, count_sql: &str) -> Result<u64> {
        let value = self.query_scalar(count_sql, &TableSelector::First)?;
        Ok(value.as_ref().and_then(Value::as_u64).unwrap_or(0))
    }

    // ========== Writes ==========

    /// Insert one row and return it with populated columns filled in
    pub fn insert(&self, table: &TableDescriptor, values: Row) -> Result<Row> {
        let mut values = values;
        let sql = sql::build_insert(table, &mut values, &Utc::now())?;
        tracing::debug!(table = table.table, "{}", sql);
        self.store.execute(&sql)?;
        Ok(values)
    }

    /// Insert one typed record and return it with populated fields filled in
    pub fn insert_as<T: Serialize + DeserializeOwned>(&self, table: &TableDescriptor, record: &T) -> Result<T> {
        from_row(self.insert(table, to_row(record)?)?)
    }

    /// Update every row matching the filter; returns the number updated
    pub fn update(
        &self,
        table: &TableDescriptor,
        filter: &Filter,
        also_where: Option<&str>,
        values: Row,
        include_deleted: bool,
    ) -> Result<usize> {
        let mut values = values;
        let sql = sql::build_update(table, filter, also_where, &mut values, include_deleted, &Utc::now())?;
        tracing::debug!(table = table.table, "{}", sql);
        self.store.execute(&sql)
    }

    /// Delete every row matching the filter; returns the number deleted
    ///
    /// Soft deletes are an `update` of the `deleted` column instead.
    pub fn delete(
        &self,
        table: &TableDescriptor,
        filter: &Filter,
        also_where: Option<&str>,
        include_deleted: bool,
    ) -> Result<usize> {
        let sql = sql::build_delete(table, filter, also_where, include_deleted)?;
        tracing::debug!(table = table.table, "{}", sql);
        self.store.execute(&sql)
    }

    /// Update the single row matching the filter, or insert it when absent
    ///
    /// Returns the stored row after an update, or the populated input row
    /// after an insert.
    pub fn upsert(
        &self,
        table: &TableDescriptor,
        filter: &Filter,
        also_where: Option<&str>,
        values: Row,
        include_deleted: bool,
    ) -> Result<Row> {
        let count = self.update(table, filter, also_where, values.clone(), include_deleted)?;
        if count > 1 {
            return Err(Error::InvariantViolation(format!(
                "upsert into {} updated {} rows instead of just 1",
                table.table, count
            )));
        }

        let mut req = FetchRequest::new()
            .filter(filter.clone())
            .include_deleted(include_deleted);
        req.also_where = also_where.map(str::to_string);
        let existing = self.fetch_one(table, &req)?;

        match (count, existing) {
            (1, Some(row)) => Ok(row),
            // Updated out of the filter's reach (e.g. soft-deleted)
            (1, None) => Ok(values),
            (_, None) => self.insert(table, values),
            (_, Some(_)) => Err(Error::InvariantViolation(format!(
                "a row of {} matching the filter appeared after the update matched none",
                table.table
            ))),
        }
    }

    /// Typed variant of [`QueryEngine::upsert`]
    pub fn upsert_as<T: Serialize + DeserializeOwned>(
        &self,
        table: &TableDescriptor,
        filter: &Filter,
        also_where: Option<&str>,
        record: &T,
        include_deleted: bool,
    ) -> Result<T> {
        from_row(self.upsert(table, filter, also_where, to_row(record)?, include_deleted)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::escape::text_search_filter;
    use crate::db::table::{Populate, SortOrder, lookup_col};
    use crate::storage::SqliteStore;
    use serde::Deserialize;
    use serde_json::json;

    const ITEMS: TableDescriptor = TableDescriptor::new("item")
        .title_col("name")
        .sort_order(&["seq"])
        .deleted_flag()
        .populate_on_insert(&[("id", Populate::Uuid), ("created_at", Populate::Now)])
        .populate_on_update(&[("updated_at", Populate::Now)]);

    const TAGS: TableDescriptor = TableDescriptor::new("tag").sort_order(&["item_id"]);

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .execute_batch(
                "CREATE TABLE item (
                    id TEXT PRIMARY KEY,
                    seq INTEGER NOT NULL DEFAULT 0,
                    name TEXT,
                    note TEXT,
                    created_at TEXT,
                    updated_at TEXT,
                    deleted BOOLEAN NOT NULL DEFAULT FALSE
                );
                CREATE TABLE tag (
                    item_id TEXT NOT NULL,
                    label TEXT NOT NULL
                );",
            )
            .unwrap();
        store
    }

    fn values(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn seed(engine: &QueryEngine, n: i64) {
        for seq in 1..=n {
            engine
                .insert(&ITEMS, values(json!({"seq": seq, "name": format!("item {}", seq)})))
                .unwrap();
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Item {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        seq: Option<i64>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        created_at: Option<String>,
        #[serde(default)]
        deleted: Option<bool>,
    }

    #[test]
    fn test_insert_then_fetch_round_trips_populated_fields() {
        let store = store();
        let engine = QueryEngine::new(&store);

        let inserted = engine
            .insert_as(&ITEMS, &Item { id: None, seq: Some(1), name: Some("a".into()), created_at: None, deleted: None })
            .unwrap();
        let id = inserted.id.clone().unwrap();
        assert_eq!(id.len(), 36);

        let fetched: Item = engine
            .fetch_one_as(&ITEMS, &FetchRequest::new().filter(ITEMS.pk_filter(&id)))
            .unwrap()
            .unwrap();
        assert_eq!(fetched.id, inserted.id);
        assert_eq!(fetched.created_at, inserted.created_at);
        assert_eq!(fetched.deleted, Some(false));
    }

    #[test]
    fn test_paging_window_and_total_count() {
        let store = store();
        let engine = QueryEngine::new(&store);
        seed(&engine, 23);

        let page = engine
            .fetch_page(&ITEMS, &FetchRequest::new().skip(Some(5)).take(Some(10)).with_count())
            .unwrap();
        assert_eq!(page.count, Some(23));
        let seqs: Vec<i64> = page.rows.iter().map(|r| r["seq"].as_i64().unwrap()).collect();
        assert_eq!(seqs, (6..=15).collect::<Vec<_>>());
    }

    #[test]
    fn test_soft_deleted_rows_hidden_unless_included() {
        let store = store();
        let engine = QueryEngine::new(&store);
        seed(&engine, 3);

        let n = engine
            .update(&ITEMS, &Filter::by("seq", 2), None, values(json!({"deleted": true})), false)
            .unwrap();
        assert_eq!(n, 1);

        let visible = engine.fetch_page(&ITEMS, &FetchRequest::new().with_count()).unwrap();
        assert_eq!(visible.count, Some(2));
        let all = engine
            .fetch_page(&ITEMS, &FetchRequest::new().include_deleted(true).with_count())
            .unwrap();
        assert_eq!(all.count, Some(3));
    }

    #[test]
    fn test_update_matching_nothing_returns_zero() {
        let store = store();
        let engine = QueryEngine::new(&store);
        seed(&engine, 2);

        let n = engine
            .update(&ITEMS, &Filter::by("seq", 99), None, values(json!({"name": "x"})), false)
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn test_update_stamps_updated_at() {
        let store = store();
        let engine = QueryEngine::new(&store);
        seed(&engine, 1);

        engine
            .update(&ITEMS, &Filter::by("seq", 1), None, values(json!({"name": "renamed"})), false)
            .unwrap();
        let row = engine.fetch_one(&ITEMS, &FetchRequest::new()).unwrap().unwrap();
        assert_eq!(row["name"], json!("renamed"));
        assert!(row["updated_at"].is_string());
    }

    #[test]
    fn test_delete_by_filter() {
        let store = store();
        let engine = QueryEngine::new(&store);
        seed(&engine, 4);

        let n = engine
            .delete(&ITEMS, &Filter::raw("seq > 2"), None, false)
            .unwrap();
        assert_eq!(n, 2);
        assert!(matches!(
            engine.delete(&ITEMS, &Filter::None, None, false),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_upsert_inserts_then_updates() {
        let store = store();
        let engine = QueryEngine::new(&store);

        let filter = Filter::by("id", "fixed-id");
        let first = engine
            .upsert(&ITEMS, &filter, None, values(json!({"id": "fixed-id", "name": "one"})), true)
            .unwrap();
        assert!(first["created_at"].is_string());

        let second = engine
            .upsert(&ITEMS, &filter, None, values(json!({"name": "two"})), true)
            .unwrap();
        assert_eq!(second["name"], json!("two"));
        assert_eq!(second["created_at"], first["created_at"]);

        let page = engine.fetch_page(&ITEMS, &FetchRequest::new().with_count()).unwrap();
        assert_eq!(page.count, Some(1));
    }

    #[test]
    fn test_upsert_rejects_non_unique_filter() {
        let store = store();
        let engine = QueryEngine::new(&store);
        seed(&engine, 2);

        let err = engine
            .upsert(&ITEMS, &Filter::by("deleted", false), None, values(json!({"note": "x"})), false)
            .unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }

    #[test]
    fn test_text_search_requires_every_term() {
        let store = store();
        let engine = QueryEngine::new(&store);
        for (seq, name, note) in [
            (1, "Exact Phrase here", "keyword"),
            (2, "exact", "phrase keyword"),
            (3, "KEYWORD and an exact phrase", ""),
            (4, "nothing", "exact phrase"),
        ] {
            engine
                .insert(&ITEMS, values(json!({"seq": seq, "name": name, "note": note})))
                .unwrap();
        }

        let search = text_search_filter(Some(r#""exact phrase" keyword"#), &["name", "note"]).unwrap();
        let page = engine
            .fetch_page(&ITEMS, &FetchRequest::new().filter(Filter::raw(format!("1=1 {}", search))))
            .unwrap();
        let seqs: Vec<i64> = page.rows.iter().map(|r| r["seq"].as_i64().unwrap()).collect();
        assert_eq!(seqs, vec![1, 3]);
    }

    #[test]
    fn test_text_search_folds_non_ascii_case() {
        let store = store();
        let engine = QueryEngine::new(&store);
        engine
            .insert(&ITEMS, values(json!({"seq": 1, "name": "Élodie Müller"})))
            .unwrap();
        engine
            .insert(&ITEMS, values(json!({"seq": 2, "name": "Elodie Muller"})))
            .unwrap();

        for text in ["Élodie", "élodie", "MÜLLER", r#""élodie müller""#] {
            let search = text_search_filter(Some(text), &["name"]).unwrap();
            let page = engine
                .fetch_page(&ITEMS, &FetchRequest::new().filter(Filter::raw(format!("1=1 {}", search))))
                .unwrap();
            let seqs: Vec<i64> = page.rows.iter().map(|r| r["seq"].as_i64().unwrap()).collect();
            assert_eq!(seqs, vec![1], "searching {}", text);
        }
    }

    #[test]
    fn test_derived_columns_and_post_processing() {
        let store = store();
        let engine = QueryEngine::new(&store);
        let item = engine
            .insert(&ITEMS, values(json!({"name": "widget"})))
            .unwrap();
        let id = item["id"].as_str().unwrap().to_string();
        for label in ["a", "b"] {
            engine
                .insert(&TAGS, values(json!({"item_id": id, "label": label})))
                .unwrap();
        }

        let page = engine
            .fetch_page(
                &TAGS,
                &FetchRequest::new()
                    .columns(vec![
                        Column::named("label"),
                        lookup_col(&ITEMS, Some("item_id"), Some("item_name"), None).unwrap(),
                        Column::expr_with("shout", "UPPER(t.label)", |v| {
                            Ok(json!(format!("{}!", v.as_str().unwrap_or_default())))
                        }),
                    ])
                    .order(SortOrder::columns(&["label!"])),
            )
            .unwrap();
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.rows[0]["label"], json!("b"));
        assert_eq!(page.rows[0]["item_name"], json!("widget"));
        assert_eq!(page.rows[0]["shout"], json!("B!"));
        assert_eq!(page.count, None);
    }

    #[test]
    fn test_fetch_scalar_reads_requested_column() {
        let store = store();
        let engine = QueryEngine::new(&store);
        seed(&engine, 3);

        let name = engine
            .fetch_scalar(&ITEMS, &FetchRequest::new().filter(Filter::by("seq", 2)), Some(Column::named("name")))
            .unwrap();
        assert_eq!(name, Some(json!("item 2")));

        let missing = engine
            .fetch_scalar(&ITEMS, &FetchRequest::new().filter(Filter::by("seq", 9)), Some(Column::named("name")))
            .unwrap();
        assert_eq!(missing, None);
    }

    #[test]
    fn test_named_result_tables() {
        let store = store();
        let engine = QueryEngine::new(&store);
        seed(&engine, 2);

        let sql = "SELECT 'Items' AS _name;
                   SELECT * FROM item;
                   SELECT COUNT(*) AS n FROM item;";
        let set = engine.query_tables(sql).unwrap();
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["Items", "t1"]);

        let n = engine.query_scalar(sql, &"t1".into()).unwrap();
        assert_eq!(n, Some(json!(2)));
        assert!(matches!(
            engine.query_table(sql, &"Missing".into()),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_bad_sql_is_query_error_with_statement() {
        let store = store();
        let engine = QueryEngine::new(&store);
        match engine.fetch_page(&TableDescriptor::new("no_such_table"), &FetchRequest::new()) {
            Err(Error::Query { sql, .. }) => assert!(sql.contains("FROM no_such_table t")),
            other => panic!("expected query error, got {:?}", other),
        }
    }
}
