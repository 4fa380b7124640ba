use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{also_where, and_in};
use crate::db::{FetchRequest, Filter, Guid, PagedRowset, QueryEngine, Row, SortOrder, text_search_filter};
use crate::entities::{ENCOUNTER_NOTE_TABLE, EncounterNoteRow};
use crate::storage::Executor;
use crate::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EncounterNoteListParams {
    pub skip: Option<u64>,
    pub take: Option<u64>,
    pub filter_text: Option<String>,
    pub encounter_id: Option<Guid>,
    pub advocate_id: Option<Guid>,
    pub client_id: Option<Guid>,
}

/// Notes, newest first
pub fn encounter_note_list(
    store: &dyn Executor,
    params: &EncounterNoteListParams,
) -> Result<PagedRowset<EncounterNoteRow>> {
    let filter = Filter::None.and_some("encounter_id", params.encounter_id.clone());
    let advocate = and_in(
        "t.encounter_id",
        "SELECT id\n    FROM encounter\n    WHERE advocate_id",
        params.advocate_id.as_ref(),
    );
    let client = and_in(
        "t.encounter_id",
        "SELECT id\n    FROM encounter\n    WHERE client_id",
        params.client_id.as_ref(),
    );
    let search = text_search_filter(params.filter_text.as_deref(), &["message"])?;

    let req = FetchRequest::new()
        .filter(filter)
        .also_where(also_where([advocate, client, Some(search)]))
        .order(SortOrder::columns(&["submitted_at!"]))
        .skip(params.skip)
        .take(params.take)
        .with_count();
    QueryEngine::new(store).fetch_page_as(&ENCOUNTER_NOTE_TABLE, &req)
}

/// Insert a new note or update an existing one, soft-deleted ones included
pub fn encounter_note_save(store: &dyn Executor, item: &EncounterNoteRow) -> Result<EncounterNoteRow> {
    if item.id.is_none() && item.encounter_id.is_none() {
        return Err(Error::InvalidRequest(
            "A new note needs an encounter_id".to_string(),
        ));
    }
    let id = item.id.clone().map(Value::String).unwrap_or(Value::Null);
    QueryEngine::new(store).upsert_as(&ENCOUNTER_NOTE_TABLE, &Filter::by("id", id), None, item, true)
}

/// Soft delete; returns the number of notes deleted
pub fn encounter_note_delete(store: &dyn Executor, id: &Guid) -> Result<usize> {
    let mut values = Row::new();
    values.insert("deleted".to_string(), Value::Bool(true));
    QueryEngine::new(store).update(&ENCOUNTER_NOTE_TABLE, &ENCOUNTER_NOTE_TABLE.pk_filter(id), None, values, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::EncounterNoteType;
    use crate::services::testing::*;
    use crate::services::{EncounterListParams, encounter_list};

    fn list(store: &dyn Executor, params: EncounterNoteListParams) -> PagedRowset<EncounterNoteRow> {
        encounter_note_list(store, &params).unwrap()
    }

    fn notes_count(store: &dyn Executor, encounter_id: &str) -> i64 {
        encounter_list(store, &EncounterListParams::default())
            .unwrap()
            .rows
            .into_iter()
            .find(|e| e.id.as_deref() == Some(encounter_id))
            .and_then(|e| e.notes_count)
            .unwrap()
    }

    #[test]
    fn test_notes_of_encounter() {
        let store = sample_store();
        let page = list(
            &store,
            EncounterNoteListParams { encounter_id: Some(BILL_SOMETHING.into()), ..Default::default() },
        );
        assert_eq!(page.count, Some(1));
        let note = &page.rows[0];
        assert_eq!(note.note_type, Some(EncounterNoteType::CaseNote));
        assert_eq!(note.personal, Some(true));
        assert_eq!(note.submitted_by_id.as_deref(), Some(CATHY));
    }

    #[test]
    fn test_notes_of_client_newest_first() {
        let store = sample_store();
        let page = list(
            &store,
            EncounterNoteListParams { client_id: Some(BILL.into()), ..Default::default() },
        );
        let ids: Vec<&str> = page.rows.iter().map(|n| n.id.as_deref().unwrap()).collect();
        assert_eq!(
            ids,
            vec!["8e966b88-f2d5-43dc-a770-12cdf719a87b", "261a8fea-c8f0-4fbe-8447-f157ac013666"]
        );

        let of_advocate = list(
            &store,
            EncounterNoteListParams { advocate_id: Some(CATHY.into()), ..Default::default() },
        );
        assert_eq!(of_advocate.count, Some(3));
    }

    #[test]
    fn test_note_phrase_search() {
        let store = sample_store();
        let page = list(
            &store,
            EncounterNoteListParams { filter_text: Some(r#""help me""#.into()), ..Default::default() },
        );
        assert_eq!(page.count, Some(1));
        assert!(page.rows[0].message.as_deref().unwrap().contains("don't"));
    }

    #[test]
    fn test_save_new_note_populates_fields() {
        let store = sample_store();
        let saved = encounter_note_save(
            &store,
            &EncounterNoteRow {
                encounter_id: Some(AMY_INQUIRY.into()),
                submitted_by_id: Some(CATHY.into()),
                note_type: Some(EncounterNoteType::DirectMessage),
                message: Some("How are you feeling today?".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(saved.id.is_some());
        assert!(saved.submitted_at.is_some());
        assert_eq!(saved.created_at, saved.updated_at);
        assert_eq!(notes_count(&store, AMY_INQUIRY), 2);
    }

    #[test]
    fn test_save_existing_note_updates_it() {
        let store = sample_store();
        let id = "c3d6a118-4125-4851-ba23-a511e861259c";
        let saved = encounter_note_save(
            &store,
            &EncounterNoteRow {
                id: Some(id.into()),
                message: Some("edited".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(saved.id.as_deref(), Some(id));
        assert_eq!(saved.message.as_deref(), Some("edited"));
        assert_eq!(saved.encounter_id.as_deref(), Some(AMY_INQUIRY));
        assert_ne!(saved.updated_at, saved.created_at);
        assert_eq!(notes_count(&store, AMY_INQUIRY), 1);
    }

    #[test]
    fn test_save_without_encounter_is_rejected() {
        let store = sample_store();
        let err = encounter_note_save(&store, &EncounterNoteRow::default()).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_delete_then_restore_by_saving() {
        let store = sample_store();
        let id = "261a8fea-c8f0-4fbe-8447-f157ac013666".to_string();
        let encounter = "912b509a-d62e-46b5-960f-6848dc8fb08b";

        assert_eq!(encounter_note_delete(&store, &id).unwrap(), 1);
        assert_eq!(encounter_note_delete(&store, &id).unwrap(), 0);
        assert_eq!(notes_count(&store, encounter), 0);

        let restored = encounter_note_save(
            &store,
            &EncounterNoteRow { id: Some(id.clone()), deleted: Some(false), ..Default::default() },
        )
        .unwrap();
        assert_eq!(restored.deleted, Some(false));
        assert_eq!(notes_count(&store, encounter), 1);
    }
}
