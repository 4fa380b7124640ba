use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{Guid, Populate, TableDescriptor};

/// Users are people who can sign in: advocates and their clients
pub const USER_TABLE: TableDescriptor = TableDescriptor::new("user_")
    .title_col("name")
    .sort_order(&["name"])
    .deleted_flag()
    .populate_on_insert(&[
        ("id", Populate::Uuid),
        ("created_at", Populate::Now),
        ("updated_at", Populate::Now),
    ])
    .populate_on_update(&[("updated_at", Populate::Now)]);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Guid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "crate::db::timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "crate::db::timestamp::option")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
}
