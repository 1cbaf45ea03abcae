use axum::{
    extract::{Extension, Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::IpAddr;

use crate::{
    config::ActivityBackend,
    error::AppError,
    models::{ActiveSession, ActivityConfig, Payloads, Session, SessionType},
    services::{activity::purge_session, session_payload::PayloadContext},
    state::AppState,
};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityConfigResponse {
    pub backend: String,
    pub session_type: String,
    pub supported: bool,
    pub duration_ms: u64,
}

impl ActivityConfigResponse {
    fn new(backend: ActivityBackend, session_type: &SessionType, config: ActivityConfig) -> Self {
        Self {
            backend: backend.to_string(),
            session_type: session_type.to_string(),
            supported: config.supported,
            duration_ms: u64::try_from(config.duration.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActiveSessionResponse {
    pub serial_number: String,
    pub session_id: String,
    pub last_active: DateTime<Utc>,
    pub is_current: bool,
}

impl ActiveSessionResponse {
    fn from_active(session: ActiveSession, current_id: &str) -> Self {
        let is_current = session.session_id == current_id;
        Self {
            serial_number: session.serial_number,
            session_id: session.session_id,
            last_active: session.last_active,
            is_current,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PayloadRequest {
    pub session_type: SessionType,
    pub uid: String,
    #[serde(default)]
    pub remote_ip: Option<IpAddr>,
}

pub async fn get_activity_config(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Json<ActivityConfigResponse> {
    let config = state.activity.config(&session.session_type);
    Json(ActivityConfigResponse::new(
        state.config.activity.backend,
        &session.session_type,
        config,
    ))
}

/// Lists the caller's recently active logins, most recent first.
pub async fn list_active_sessions(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<ActiveSessionResponse>>, AppError> {
    let mut sessions = state
        .activity
        .get_active_sessions(&session.session_type, &session.uid)
        .await?;
    sessions.sort_by(|a, b| b.last_active.cmp(&a.last_active));
    let responses = sessions
        .into_iter()
        .map(|active| ActiveSessionResponse::from_active(active, &session.id))
        .collect();
    Ok(Json(responses))
}

pub async fn revoke_active_session(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(serial_number): Path<String>,
) -> Result<Json<Value>, AppError> {
    let serial_number = serial_number.trim();
    if serial_number.is_empty() {
        return Err(AppError::BadRequest("Serial number is required".into()));
    }
    if serial_number == session.serial_number() {
        return Err(AppError::BadRequest(
            "Cannot revoke current session; use logout instead".into(),
        ));
    }

    let active = state
        .activity
        .get_active_sessions(&session.session_type, &session.uid)
        .await?;
    if !active
        .iter()
        .any(|active| active.serial_number == serial_number)
    {
        return Err(AppError::NotFound("Session not found".into()));
    }

    state
        .activity
        .purge_active_session(&session.session_type, &session.uid, serial_number)
        .await?;
    tracing::info!(
        session_type = %session.session_type,
        uid = %session.uid,
        "Revoked active session"
    );

    Ok(Json(json!({
        "message": "Session revoked",
        "serial_number": serial_number
    })))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Value>, AppError> {
    purge_session(state.activity.as_ref(), Some(&session)).await?;
    Ok(Json(json!({ "message": "Logged out" })))
}

/// Login hook: builds the payloads a new session must carry.
pub async fn init_payloads(
    State(state): State<AppState>,
    Json(request): Json<PayloadRequest>,
) -> Result<Json<Payloads>, AppError> {
    if request.uid.trim().is_empty() {
        return Err(AppError::BadRequest("uid is required".into()));
    }
    let mut ctx = PayloadContext::new(request.session_type, request.uid);
    if let Some(ip) = request.remote_ip {
        ctx = ctx.with_remote_ip(ip);
    }
    Ok(Json(state.payloads.init_payloads(&ctx)))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
