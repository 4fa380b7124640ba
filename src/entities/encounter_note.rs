use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{Guid, Populate, TableDescriptor};

/// Each encounter typically has one or more direct messages or notes attached
pub const ENCOUNTER_NOTE_TABLE: TableDescriptor = TableDescriptor::new("encounter_note")
    .sort_order(&["submitted_at", "created_at"])
    .deleted_flag()
    .populate_on_insert(&[
        ("id", Populate::Uuid),
        ("submitted_at", Populate::Now),
        ("created_at", Populate::Now),
        ("updated_at", Populate::Now),
    ])
    .populate_on_update(&[("updated_at", Populate::Now)]);

/// Stored as its integer code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum EncounterNoteType {
    DirectMessage = 1,
    CaseNote = 2,
}

impl EncounterNoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncounterNoteType::DirectMessage => "direct message",
            EncounterNoteType::CaseNote => "case note",
        }
    }
}

impl From<EncounterNoteType> for i64 {
    fn from(kind: EncounterNoteType) -> Self {
        kind as i64
    }
}

impl TryFrom<i64> for EncounterNoteType {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(EncounterNoteType::DirectMessage),
            2 => Ok(EncounterNoteType::CaseNote),
            other => Err(format!("unknown encounter note type {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncounterNoteRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Guid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encounter_id: Option<Guid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_by_id: Option<Guid>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub note_type: Option<EncounterNoteType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "crate::db::timestamp::option")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "crate::db::timestamp::option")]
    pub advocate_read_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "crate::db::timestamp::option")]
    pub client_read_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "crate::db::timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "crate::db::timestamp::option")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
}
