use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{Guid, Populate, TableDescriptor};

/// An appointment, stay, or other continuous event involving an advocate and
/// a client
pub const ENCOUNTER_TABLE: TableDescriptor = TableDescriptor::new("encounter")
    .sort_order(&["created_at"])
    .deleted_flag()
    .populate_on_insert(&[
        ("id", Populate::Uuid),
        ("started_at", Populate::Now),
        ("created_at", Populate::Now),
        ("updated_at", Populate::Now),
    ])
    .populate_on_update(&[("updated_at", Populate::Now)]);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncounterRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Guid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advocate_id: Option<Guid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<Guid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiated_by_advocate: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "crate::db::timestamp::option")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "crate::db::timestamp::option")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "crate::db::timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "crate::db::timestamp::option")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,

    // Derived columns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advocate_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
}
