//! GET /list and GET /list/{id} — active session listings.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use waypoint_core::Session;

use super::ApiState;

/// The public shape of a session. Digest internals stay private; clients
/// address sessions by their sequence id.
#[derive(Debug, Serialize)]
pub struct SessionFields {
    pub id: i32,
    pub username: String,
    pub country: String,
    pub game_name: String,
    pub game_crc: String,
    pub core_name: String,
    pub core_version: String,
    pub subsystem_name: String,
    pub client_version: String,
    pub frontend: String,
    pub ip: String,
    pub port: u16,
    pub host_method: u8,
    pub relay_addr: String,
    pub relay_port: u16,
    pub relay_session: String,
    pub has_password: bool,
    pub has_spectator_password: bool,
    pub connectable: bool,
    pub protocol_ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_count: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spectator_count: Option<i16>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl From<Session> for SessionFields {
    fn from(s: Session) -> Self {
        Self {
            id: s.sequence_id,
            username: s.username,
            country: s.country,
            game_name: s.game_name,
            game_crc: s.game_crc,
            core_name: s.core_name,
            core_version: s.core_version,
            subsystem_name: s.subsystem_name,
            client_version: s.client_version,
            frontend: s.frontend,
            ip: s.ip.to_string(),
            port: s.port,
            host_method: s.host_method.as_u8(),
            relay_addr: s.relay_addr,
            relay_port: s.relay_port,
            relay_session: s.relay_session,
            has_password: s.has_password,
            has_spectator_password: s.has_spectator_password,
            connectable: s.connectable,
            protocol_ok: s.protocol_ok,
            player_count: s.player_count,
            spectator_count: s.spectator_count,
            created: s.created_at,
            updated: s.updated_at,
        }
    }
}

/// Legacy wrapper: clients expect each session under a "fields" key.
#[derive(Debug, Serialize)]
pub struct ListEntry {
    pub fields: SessionFields,
}

pub async fn handle_list(
    State(state): State<ApiState>,
) -> Result<Json<Vec<ListEntry>>, (StatusCode, String)> {
    let sessions = state.registry.list().await.map_err(|e| {
        tracing::error!(error = %e, "can't list sessions");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal error".to_string(),
        )
    })?;

    Ok(Json(
        sessions
            .into_iter()
            .map(|s| ListEntry { fields: s.into() })
            .collect(),
    ))
}

pub async fn handle_get(
    State(state): State<ApiState>,
    Path(id): Path<i32>,
) -> Result<Json<SessionFields>, (StatusCode, String)> {
    let session = state.registry.get(id).await.map_err(|e| {
        tracing::error!(error = %e, id, "can't look up session");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal error".to_string(),
        )
    })?;

    match session {
        Some(s) => Ok(Json(s.into())),
        None => Err((StatusCode::NOT_FOUND, "session not found".to_string())),
    }
}
