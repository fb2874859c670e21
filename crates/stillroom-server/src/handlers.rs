//! REST handlers for sessions, settings, stats and health.
//!
//! Store calls are synchronous (SQLite behind a mutex), so each one runs on
//! the blocking pool.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use stillroom_core::{
    ActorKey, NewSession, Session, SessionPatch, SessionStats, SessionStore, SettingsPatch,
    StatsAggregator, StorageError, UserSettings,
};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::AppState;

/// `?userId=` on list, settings and stats routes. Absent or empty means the
/// anonymous actor.
#[derive(Debug, Default, Deserialize)]
pub struct ActorQuery {
    #[serde(rename = "userId", default)]
    pub user_id: Option<String>,
}

impl ActorQuery {
    fn actor(self) -> ActorKey {
        ActorKey::new(self.user_id)
    }
}

/// Body of `POST /api/settings`: the fields to set plus the owning user.
#[derive(Debug, Deserialize)]
pub struct SettingsBody {
    #[serde(rename = "userId", default)]
    pub user_id: Option<String>,
    #[serde(flatten)]
    pub patch: SettingsPatch,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

/// Run a store call on the blocking pool.
async fn with_store<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&dyn SessionStore) -> Result<T, StorageError> + Send + 'static,
{
    let store = state.store.clone();
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|e| ApiError::Internal(format!("store task failed: {e}")))?
        .map_err(ApiError::from)
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(v)| v).map_err(|rejection| {
        warn!(error = %rejection.body_text(), "rejected request body");
        ApiError::BadRequest(rejection.body_text())
    })
}

fn session_not_found() -> ApiError {
    ApiError::NotFound("Session not found".into())
}

// ── Sessions ─────────────────────────────────────────────────────────

/// POST /api/sessions
pub async fn create_session(
    State(state): State<AppState>,
    payload: Result<Json<NewSession>, JsonRejection>,
) -> Result<Json<Session>, ApiError> {
    let new = body(payload)?;
    let session = with_store(&state, move |store| store.create_session(new)).await?;
    debug!(id = %session.id, preset = %session.preset_name, "session created");
    Ok(Json(session))
}

/// GET /api/sessions?userId=
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ActorQuery>,
) -> Result<Json<Vec<Session>>, ApiError> {
    let actor = query.actor();
    let sessions = with_store(&state, move |store| store.list_sessions(&actor)).await?;
    Ok(Json(sessions))
}

/// GET /api/sessions/:id
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    with_store(&state, move |store| store.get_session(&id))
        .await?
        .map(Json)
        .ok_or_else(session_not_found)
}

/// PATCH /api/sessions/:id
///
/// Only the completion fields are read from the body; anything else is
/// ignored.
pub async fn update_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<SessionPatch>, JsonRejection>,
) -> Result<Json<Session>, ApiError> {
    let patch = body(payload)?;
    with_store(&state, move |store| store.update_session(&id, &patch))
        .await?
        .map(Json)
        .ok_or_else(session_not_found)
}

/// DELETE /api/sessions/:id
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let deleted = with_store(&state, move |store| store.delete_session(&id)).await?;
    if !deleted {
        return Err(session_not_found());
    }
    Ok(Json(DeleteResponse { success: true }))
}

// ── Settings ─────────────────────────────────────────────────────────

/// GET /api/settings?userId=
pub async fn get_settings(
    State(state): State<AppState>,
    Query(query): Query<ActorQuery>,
) -> Result<Json<UserSettings>, ApiError> {
    let actor = query.actor();
    let settings = with_store(&state, move |store| store.get_settings(&actor)).await?;
    Ok(Json(settings))
}

/// POST /api/settings
pub async fn create_settings(
    State(state): State<AppState>,
    payload: Result<Json<SettingsBody>, JsonRejection>,
) -> Result<Json<UserSettings>, ApiError> {
    let SettingsBody { user_id, patch } = body(payload)?;
    let actor = ActorKey::new(user_id);
    let settings = with_store(&state, move |store| store.upsert_settings(&actor, &patch)).await?;
    Ok(Json(settings))
}

/// PATCH /api/settings?userId=
pub async fn update_settings(
    State(state): State<AppState>,
    Query(query): Query<ActorQuery>,
    payload: Result<Json<SettingsPatch>, JsonRejection>,
) -> Result<Json<UserSettings>, ApiError> {
    let patch = body(payload)?;
    let actor = query.actor();
    let settings = with_store(&state, move |store| store.upsert_settings(&actor, &patch)).await?;
    Ok(Json(settings))
}

// ── Stats & health ───────────────────────────────────────────────────

/// GET /api/stats?userId=
pub async fn get_stats(
    State(state): State<AppState>,
    Query(query): Query<ActorQuery>,
) -> Result<Json<SessionStats>, ApiError> {
    let actor = query.actor();
    let sessions = with_store(&state, move |store| store.list_sessions(&actor)).await?;
    Ok(Json(StatsAggregator::local().aggregate(&sessions)))
}

/// GET /api/health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}
