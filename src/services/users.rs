use serde::{Deserialize, Serialize};

use super::{also_where, and_in};
use crate::Result;
use crate::db::{FetchRequest, Guid, PagedRowset, QueryEngine, text_search_filter};
use crate::entities::{USER_TABLE, UserRow};
use crate::storage::Executor;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserListParams {
    pub skip: Option<u64>,
    pub take: Option<u64>,
    pub filter_text: Option<String>,
    /// Only clients with an active encounter with this advocate
    pub advocate_id: Option<Guid>,
}

/// Fetch a single user record
pub fn user_get(store: &dyn Executor, id: &Guid) -> Result<Option<UserRow>> {
    QueryEngine::new(store).fetch_one_as(&USER_TABLE, &FetchRequest::new().filter(USER_TABLE.pk_filter(id)))
}

pub fn user_list(store: &dyn Executor, params: &UserListParams) -> Result<PagedRowset<UserRow>> {
    let search = text_search_filter(params.filter_text.as_deref(), &["name"])?;
    let advocate = and_in(
        "t.id",
        "SELECT client_id\n    FROM encounter\n    WHERE deleted = FALSE\n    AND advocate_id",
        params.advocate_id.as_ref(),
    );

    let req = FetchRequest::new()
        .also_where(also_where([Some(search), advocate]))
        .skip(params.skip)
        .take(params.take)
        .with_count();
    QueryEngine::new(store).fetch_page_as(&USER_TABLE, &req)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Filter, Row};
    use crate::services::testing::*;
    use serde_json::{Value, json};

    fn names(page: &PagedRowset<UserRow>) -> Vec<&str> {
        page.rows.iter().map(|u| u.name.as_deref().unwrap()).collect()
    }

    #[test]
    fn test_user_get() {
        let store = sample_store();
        let cathy = user_get(&store, &CATHY.to_string()).unwrap().unwrap();
        assert_eq!(cathy.name.as_deref(), Some("Caregiving Cathy"));
        assert_eq!(cathy.deleted, Some(false));
        assert!(cathy.created_at.is_some());

        assert!(user_get(&store, &"nobody".to_string()).unwrap().is_none());
    }

    #[test]
    fn test_user_list_sorted_by_name_with_count() {
        let store = sample_store();
        let page = user_list(&store, &UserListParams::default()).unwrap();
        assert_eq!(page.count, Some(3));
        assert_eq!(names(&page), vec!["Ailment Amy", "Broken Bill", "Caregiving Cathy"]);

        let window = user_list(
            &store,
            &UserListParams { skip: Some(1), take: Some(1), ..Default::default() },
        )
        .unwrap();
        assert_eq!(window.count, Some(3));
        assert_eq!(names(&window), vec!["Broken Bill"]);
    }

    #[test]
    fn test_user_list_text_search() {
        let store = sample_store();
        let page = user_list(
            &store,
            &UserListParams { filter_text: Some("BILL".into()), ..Default::default() },
        )
        .unwrap();
        assert_eq!(page.count, Some(1));
        assert_eq!(names(&page), vec!["Broken Bill"]);
    }

    #[test]
    fn test_user_list_clients_of_advocate() {
        let store = sample_store();
        let page = user_list(
            &store,
            &UserListParams { advocate_id: Some(CATHY.into()), ..Default::default() },
        )
        .unwrap();
        assert_eq!(names(&page), vec!["Ailment Amy", "Broken Bill"]);
    }

    #[test]
    fn test_user_list_skips_deleted_users() {
        let store = sample_store();
        let mut values = Row::new();
        values.insert("deleted".into(), Value::Bool(true));
        QueryEngine::new(&store)
            .update(&USER_TABLE, &Filter::by("id", json!(BILL)), None, values, false)
            .unwrap();

        let page = user_list(&store, &UserListParams::default()).unwrap();
        assert_eq!(page.count, Some(2));
        assert!(!names(&page).contains(&"Broken Bill"));
    }

    #[test]
    fn test_params_use_camel_case() {
        let params: UserListParams =
            serde_json::from_value(json!({"filterText": "amy", "advocateId": CATHY, "take": 5})).unwrap();
        assert_eq!(params.filter_text.as_deref(), Some("amy"));
        assert_eq!(params.advocate_id.as_deref(), Some(CATHY));
        assert_eq!(params.take, Some(5));
        assert_eq!(params.skip, None);
    }
}
