use axum::{
    Router,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::migrations::{MigrationRegistry, MigrationTarget};
use crate::storage::SqliteStore;

pub mod routes;

/// Server state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SqliteStore>,
    pub registry: Arc<MigrationRegistry>,
    /// Checkpoint used by `/api/migrations/run`
    pub target: MigrationTarget,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::handle_health))
        .route("/api/user/get", post(routes::handle_user_get))
        .route("/api/user/list", post(routes::handle_user_list))
        .route("/api/encounter/list", post(routes::handle_encounter_list))
        .route("/api/encounter/note/list", post(routes::handle_encounter_note_list))
        .route("/api/encounter/note/save", post(routes::handle_encounter_note_save))
        .route("/api/encounter/note/delete", post(routes::handle_encounter_note_delete))
        .route("/api/migrations/run", post(routes::handle_migrations_run))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(port: u16, state: AppState) -> anyhow::Result<()> {
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Starting server on {}", addr);
    println!("🌍 Server running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::default_registry;
    use crate::services::testing::*;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn app() -> Router {
        router(AppState {
            store: Arc::new(sample_store()),
            registry: Arc::new(default_registry().unwrap()),
            target: MigrationTarget::Latest,
        })
    }

    async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let resp = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_health() {
        let resp = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_user_get_wraps_data() {
        let (status, body) = post_json(app(), "/api/user/get", json!({"id": CATHY})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], json!("Caregiving Cathy"));

        let (_, body) = post_json(app(), "/api/user/get", json!({"id": "missing"})).await;
        assert_eq!(body["data"], Value::Null);
    }

    #[tokio::test]
    async fn test_user_list_takes_camel_case_params() {
        let (status, body) =
            post_json(app(), "/api/user/list", json!({"filterText": "amy", "take": 10})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["count"], json!(1));
        assert_eq!(body["data"]["rows"][0]["name"], json!("Ailment Amy"));
    }

    #[tokio::test]
    async fn test_encounter_list_includes_derived_columns() {
        let (_, body) =
            post_json(app(), "/api/encounter/list", json!({"clientId": AMY})).await;
        let row = &body["data"]["rows"][0];
        assert_eq!(row["notes_count"], json!(1));
        assert_eq!(row["advocate_name"], json!("Caregiving Cathy"));
    }

    #[tokio::test]
    async fn test_note_save_and_delete() {
        let app = app();
        let (status, body) = post_json(
            app.clone(),
            "/api/encounter/note/save",
            json!({"item": {"encounter_id": AMY_INQUIRY, "type": 2, "message": "Follow up"}}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (_, body) = post_json(app.clone(), "/api/encounter/note/delete", json!({"id": id})).await;
        assert_eq!(body["data"], json!(1));

        let (_, body) = post_json(
            app,
            "/api/encounter/note/list",
            json!({"encounterId": AMY_INQUIRY}),
        )
        .await;
        assert_eq!(body["data"]["count"], json!(1));
    }

    #[tokio::test]
    async fn test_client_errors_are_400() {
        let (status, body) =
            post_json(app(), "/api/encounter/note/save", json!({"item": {"message": "orphan"}})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("encounter_id"));
    }

    #[tokio::test]
    async fn test_migrations_run_is_noop_when_current() {
        let (status, body) = post_json(app(), "/api/migrations/run", json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["applied"], json!([]));
        assert_eq!(body["data"]["rolled_back"], json!([]));
    }
}
