//! Route tests for the REST backend, driven through the router in-process.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use stillroom_core::{
    ActorKey, Database, MemoryStore, NewSession, Session, SessionPatch, SessionStore,
    SettingsPatch, StorageError, UserSettings,
};
use stillroom_server::{build_router, AppState};
use tower::ServiceExt;

fn app() -> Router {
    build_router(AppState::new(Arc::new(MemoryStore::new())))
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            request = request.header("content-type", "application/json");
            Body::from(v.to_string())
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
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// A store whose backing service never answers.
struct UnreachableStore;

fn refused<T>() -> Result<T, StorageError> {
    Err(StorageError::Unavailable("connection refused".into()))
}

impl SessionStore for UnreachableStore {
    fn create_session(&self, _new: NewSession) -> Result<Session, StorageError> {
        refused()
    }

    fn get_session(&self, _id: &str) -> Result<Option<Session>, StorageError> {
        refused()
    }

    fn list_sessions(&self, _actor: &ActorKey) -> Result<Vec<Session>, StorageError> {
        refused()
    }

    fn update_session(&self, _id: &str, _patch: &SessionPatch) -> Result<Option<Session>, StorageError> {
        refused()
    }

    fn delete_session(&self, _id: &str) -> Result<bool, StorageError> {
        refused()
    }

    fn get_settings(&self, _actor: &ActorKey) -> Result<UserSettings, StorageError> {
        refused()
    }

    fn upsert_settings(&self, _actor: &ActorKey, _patch: &SettingsPatch) -> Result<UserSettings, StorageError> {
        refused()
    }
}

fn box_session(user_id: Option<&str>) -> Value {
    json!({
        "userId": user_id,
        "presetName": "Box Breathing",
        "presetType": "breathing",
        "technique": "box",
        "duration": 600
    })
}

#[tokio::test]
async fn health_reports_ok() {
    let (status, body) = call(&app(), Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn session_lifecycle() {
    let app = app();

    let (status, created) =
        call(&app, Method::POST, "/api/sessions", Some(box_session(Some("u1")))).await;
    assert_eq!(status, StatusCode::OK);
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["completedDuration"], 0);
    assert_eq!(created["isCompleted"], false);

    let (status, fetched) = call(&app, Method::GET, &format!("/api/sessions/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["presetName"], "Box Breathing");

    let (status, updated) = call(
        &app,
        Method::PATCH,
        &format!("/api/sessions/{id}"),
        Some(json!({
            "completionPercentage": 100,
            "presetName": "ignored",
            "duration": 1
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["completedDuration"], 600);
    assert_eq!(updated["isCompleted"], true);
    assert_eq!(updated["presetName"], "Box Breathing");
    assert_eq!(updated["duration"], 600);
    assert!(updated["completedAt"].is_string());

    let (status, deleted) = call(&app, Method::DELETE, &format!("/api/sessions/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted, json!({ "success": true }));

    let (status, body) = call(&app, Method::GET, &format!("/api/sessions/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Session not found");
}

#[tokio::test]
async fn missing_sessions_are_not_found() {
    let app = app();
    let (status, _) = call(&app, Method::DELETE, "/api/sessions/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(
        &app,
        Method::PATCH,
        "/api/sessions/nope",
        Some(json!({ "completionPercentage": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn invalid_payloads_are_rejected() {
    let app = app();

    let mut zero = box_session(None);
    zero["duration"] = json!(0);
    let (status, body) = call(&app, Method::POST, "/api/sessions", Some(zero)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = call(&app, Method::POST, "/api/sessions", Some(json!({ "duration": "ten" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, created) = call(&app, Method::POST, "/api/sessions", Some(box_session(None))).await;
    let id = created["id"].as_str().unwrap();
    let (status, _) = call(
        &app,
        Method::PATCH,
        &format!("/api/sessions/{id}"),
        Some(json!({ "completionPercentage": 150 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, unchanged) = call(&app, Method::GET, &format!("/api/sessions/{id}"), None).await;
    assert_eq!(unchanged["completionPercentage"], 0);
}

#[tokio::test]
async fn sessions_are_listed_per_actor() {
    let app = app();
    for user in [Some("u1"), Some("u1"), Some("u2"), None] {
        call(&app, Method::POST, "/api/sessions", Some(box_session(user))).await;
    }

    let (_, u1) = call(&app, Method::GET, "/api/sessions?userId=u1", None).await;
    assert_eq!(u1.as_array().unwrap().len(), 2);

    let (_, anonymous) = call(&app, Method::GET, "/api/sessions", None).await;
    let anonymous = anonymous.as_array().unwrap();
    assert_eq!(anonymous.len(), 1);
    assert!(anonymous[0]["userId"].is_null());
}

#[tokio::test]
async fn settings_default_then_upsert() {
    let app = app();

    let (status, defaults) = call(&app, Method::GET, "/api/settings?userId=u1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(defaults["volume"], 50);
    assert_eq!(defaults["bellSound"], "tibetan");

    let (status, patched) = call(
        &app,
        Method::PATCH,
        "/api/settings?userId=u1",
        Some(json!({ "volume": 80, "intervalBells": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["volume"], 80);
    assert_eq!(patched["intervalBells"], true);
    assert_eq!(patched["userId"], "u1");

    let (_, other) = call(&app, Method::GET, "/api/settings?userId=u2", None).await;
    assert_eq!(other["volume"], 50);

    let (status, created) = call(
        &app,
        Method::POST,
        "/api/settings",
        Some(json!({ "userId": "u2", "bellSound": "singing-bowl" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["bellSound"], "singing-bowl");
    assert_eq!(created["userId"], "u2");

    let (status, _) = call(
        &app,
        Method::PATCH,
        "/api/settings?userId=u1",
        Some(json!({ "volume": 101 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stats_count_completed_sessions() {
    let app = build_router(AppState::new(Arc::new(Database::open_memory().unwrap())));

    let (_, empty) = call(&app, Method::GET, "/api/stats?userId=u1", None).await;
    assert_eq!(empty["totalSessions"], 0);
    assert_eq!(empty["favoriteType"], "None");
    assert_eq!(empty["lastSession"], "Never");

    for pct in [100, 95, 40] {
        let (_, created) =
            call(&app, Method::POST, "/api/sessions", Some(box_session(Some("u1")))).await;
        let id = created["id"].as_str().unwrap();
        call(
            &app,
            Method::PATCH,
            &format!("/api/sessions/{id}"),
            Some(json!({ "completionPercentage": pct })),
        )
        .await;
    }

    let (status, stats) = call(&app, Method::GET, "/api/stats?userId=u1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["totalSessions"], 2);
    assert_eq!(stats["currentStreak"], 1);
    assert_eq!(stats["favoriteType"], "box");
    assert_eq!(stats["lastSession"], "Just now");
}

#[tokio::test]
async fn unreachable_store_is_internal_error() {
    let app = build_router(AppState::new(Arc::new(UnreachableStore)));

    let (status, body) = call(&app, Method::POST, "/api/sessions", Some(box_session(None))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("connection refused"));

    for uri in ["/api/sessions/abc", "/api/settings?userId=u1", "/api/stats?userId=u1"] {
        let (status, body) = call(&app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
        assert!(body["error"].is_string(), "{uri}");
    }

    // Health does not touch the store.
    let (status, _) = call(&app, Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
}
