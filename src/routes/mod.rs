use axum::Router;

use crate::state::SharedState;

pub mod docs;
pub mod health;
pub mod rooms;
pub mod sse;
pub mod websocket;

/// Compose all route trees and wire in the shared state.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = rooms::router().merge(sse::router());

    Router::<SharedState>::new()
        .nest("/api", api_router)
        .merge(health::router())
        .merge(websocket::router())
        .merge(docs::router())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::{config::AppConfig, dao::poker_store::memory::MemoryPokerStore, state::AppState};

    async fn app() -> Router<()> {
        let state = AppState::new(AppConfig::default());
        state.install_store(Arc::new(MemoryPokerStore::default())).await;
        router(state)
    }

    async fn call(
        app: &Router<()>,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn deck_lists_twelve_cards() {
        let app = app().await;
        let (status, body) = call(&app, "GET", "/api/fibonacci", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["values"].as_array().unwrap().len(), 12);
        assert_eq!(body["values"][11], "?");
    }

    #[tokio::test]
    async fn room_flow_over_http() {
        let app = app().await;

        let (status, room) =
            call(&app, "POST", "/api/rooms", Some(json!({"name": "Sprint 12"}))).await;
        assert_eq!(status, StatusCode::OK);
        let room_id = room["id"].as_str().unwrap().to_owned();
        let lower = room_id.to_lowercase();

        let (status, joined) = call(
            &app,
            "POST",
            &format!("/api/rooms/{lower}/join"),
            Some(json!({"name": "Alice"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(joined["user"]["is_admin"], true);
        let alice = joined["user"]["id"].as_str().unwrap().to_owned();

        // A second voter keeps the round open after Alice's vote.
        let (_, bob) = call(
            &app,
            "POST",
            &format!("/api/rooms/{room_id}/join"),
            Some(json!({"name": "Bob"})),
        )
        .await;
        assert_eq!(bob["user"]["is_admin"], false);

        let (_, created) = call(
            &app,
            "POST",
            &format!("/api/rooms/{room_id}/tasks"),
            Some(json!({"title": "Login page"})),
        )
        .await;
        assert_eq!(created["applied"], true);
        let task_id = created["task"]["id"].as_str().unwrap().to_owned();

        let (_, activated) = call(
            &app,
            "POST",
            &format!("/api/rooms/{room_id}/tasks/active"),
            Some(json!({"user_id": alice, "task_id": task_id})),
        )
        .await;
        assert_eq!(activated["applied"], true);

        let (_, voted) = call(
            &app,
            "POST",
            &format!("/api/rooms/{room_id}/votes"),
            Some(json!({"user_id": alice, "task_id": task_id, "value": 5})),
        )
        .await;
        assert_eq!(voted["applied"], true);

        let (status, snapshot) =
            call(&app, "GET", &format!("/api/rooms/{room_id}/state"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(snapshot["room"]["cards_revealed"], false);
        assert_eq!(snapshot["votes"][0]["user_id"], alice.as_str());
        assert_eq!(snapshot["votes"][0]["has_voted"], true);
        assert!(snapshot["votes"][0].get("value").is_none());
        assert_eq!(snapshot["active_task"]["status"], "ACTIVE");

        let (_, tasks) = call(&app, "GET", &format!("/api/rooms/{room_id}/tasks"), None).await;
        assert_eq!(tasks.as_array().unwrap().len(), 1);
        let (_, none) = call(&app, "GET", "/api/rooms/NOPE0000/tasks", None).await;
        assert_eq!(none, serde_json::json!([]));
    }

    #[tokio::test]
    async fn unknown_room_is_not_found() {
        let app = app().await;
        let (status, body) = call(&app, "GET", "/api/rooms/NOPE0000", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["message"].as_str().is_some());
    }

    #[tokio::test]
    async fn blank_room_name_is_rejected() {
        let app = app().await;
        let (status, _) =
            call(&app, "POST", "/api/rooms", Some(json!({"name": "   "}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn discarded_action_reports_not_applied() {
        let app = app().await;
        let (status, body) = call(
            &app,
            "POST",
            "/api/rooms/NOPE0000/reveal",
            Some(json!({"user_id": "ghost"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["applied"], false);
    }

    #[tokio::test]
    async fn degraded_service_answers_unavailable() {
        let app = router(AppState::new(AppConfig::default()));
        let (status, _) =
            call(&app, "POST", "/api/rooms", Some(json!({"name": "Sprint"}))).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
