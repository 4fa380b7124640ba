use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::db::{Guid, PagedRowset};
use crate::entities::{EncounterNoteRow, EncounterRow, UserRow};
use crate::migrations::{MigrationReport, MigrationRunner};
use crate::server::AppState;
use crate::services::{self, EncounterListParams, EncounterNoteListParams, UserListParams};
use crate::storage::Executor;

/// Success envelope
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

/// Failure envelope
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn internal(message: String) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message,
        }
    }
}

impl From<crate::Error> for ApiError {
    fn from(err: crate::Error) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        tracing::error!(status = status.as_u16(), "{}", err);
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}

pub type ApiResult<T> = Result<Json<DataResponse<T>>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct IdParams {
    pub id: Guid,
}

#[derive(Debug, Deserialize)]
pub struct NoteSaveParams {
    pub item: EncounterNoteRow,
}

/// Run a store call off the async runtime and wrap its result
async fn with_store<T, F>(state: &AppState, call: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn Executor) -> crate::Result<T> + Send + 'static,
{
    let store = state.store.clone();
    let data = tokio::task::spawn_blocking(move || call(store.as_ref()))
        .await
        .map_err(|e| ApiError::internal(format!("Store task failed: {}", e)))??;
    Ok(Json(DataResponse { data }))
}

pub async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn handle_user_get(
    State(state): State<AppState>,
    Json(params): Json<IdParams>,
) -> ApiResult<Option<UserRow>> {
    with_store(&state, move |store| services::user_get(store, &params.id)).await
}

pub async fn handle_user_list(
    State(state): State<AppState>,
    Json(params): Json<UserListParams>,
) -> ApiResult<PagedRowset<UserRow>> {
    with_store(&state, move |store| services::user_list(store, &params)).await
}

pub async fn handle_encounter_list(
    State(state): State<AppState>,
    Json(params): Json<EncounterListParams>,
) -> ApiResult<PagedRowset<EncounterRow>> {
    with_store(&state, move |store| services::encounter_list(store, &params)).await
}

pub async fn handle_encounter_note_list(
    State(state): State<AppState>,
    Json(params): Json<EncounterNoteListParams>,
) -> ApiResult<PagedRowset<EncounterNoteRow>> {
    with_store(&state, move |store| services::encounter_note_list(store, &params)).await
}

pub async fn handle_encounter_note_save(
    State(state): State<AppState>,
    Json(params): Json<NoteSaveParams>,
) -> ApiResult<EncounterNoteRow> {
    with_store(&state, move |store| services::encounter_note_save(store, &params.item)).await
}

pub async fn handle_encounter_note_delete(
    State(state): State<AppState>,
    Json(params): Json<IdParams>,
) -> ApiResult<usize> {
    with_store(&state, move |store| services::encounter_note_delete(store, &params.id)).await
}

pub async fn handle_migrations_run(State(state): State<AppState>) -> ApiResult<MigrationReport> {
    let registry = state.registry.clone();
    let target = state.target.clone();
    with_store(&state, move |store| MigrationRunner::new(store, &registry).run(&target)).await
}
