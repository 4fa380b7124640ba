//! Application services
//!
//! Each service is one declarative request to the query engine. They take
//! the store as `&dyn Executor` so the HTTP layer, the CLI and tests can
//! share them.

pub mod encounters;
pub mod notes;
pub mod users;

pub use encounters::{EncounterListParams, encounter_list};
pub use notes::{EncounterNoteListParams, encounter_note_delete, encounter_note_list, encounter_note_save};
pub use users::{UserListParams, user_get, user_list};

use crate::db::{Guid, safe_value};
use serde_json::Value;

/// `AND <col> IN (<subquery> = id)` when an id is given
fn and_in(col: &str, subquery: &str, id: Option<&Guid>) -> Option<String> {
    id.map(|id| {
        format!(
            "AND {} IN (\n    {} = {}\n)",
            col,
            subquery,
            safe_value(&Value::String(id.clone()))
        )
    })
}

/// Join predicate parts under a leading `1=1`
fn also_where(parts: impl IntoIterator<Item = Option<String>>) -> String {
    let mut sql = String::from("1=1");
    for part in parts.into_iter().flatten() {
        sql.push('\n');
        sql.push_str(&part);
    }
    sql
}
