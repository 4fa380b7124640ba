use serde::{Deserialize, Serialize};

use super::also_where;
use crate::Result;
use crate::db::{Column, FetchRequest, Filter, Guid, PagedRowset, QueryEngine, SortOrder, lookup_col, text_search_filter};
use crate::entities::{ENCOUNTER_TABLE, EncounterRow, USER_TABLE};
use crate::storage::Executor;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EncounterListParams {
    pub skip: Option<u64>,
    pub take: Option<u64>,
    pub filter_text: Option<String>,
    pub advocate_id: Option<Guid>,
    pub client_id: Option<Guid>,
}

/// Encounters, newest first, with note counts and participant names
pub fn encounter_list(store: &dyn Executor, params: &EncounterListParams) -> Result<PagedRowset<EncounterRow>> {
    let filter = Filter::None
        .and_some("advocate_id", params.advocate_id.clone())
        .and_some("client_id", params.client_id.clone());
    let search = text_search_filter(params.filter_text.as_deref(), &["summary"])?;

    let req = FetchRequest::new()
        .filter(filter)
        .also_where(also_where([Some(search)]))
        .order(SortOrder::columns(&["started_at!"]))
        .columns(vec![
            Column::All,
            Column::expr(
                "notes_count",
                "SELECT COUNT(*)
                FROM encounter_note
                WHERE encounter_id = t.id
                AND deleted = FALSE",
            ),
            lookup_col(&USER_TABLE, Some("advocate_id"), Some("advocate_name"), None)?,
            lookup_col(&USER_TABLE, Some("client_id"), Some("client_name"), None)?,
        ])
        .skip(params.skip)
        .take(params.take)
        .with_count();
    QueryEngine::new(store).fetch_page_as(&ENCOUNTER_TABLE, &req)
}
