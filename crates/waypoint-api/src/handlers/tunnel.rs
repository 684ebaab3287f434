//! GET /tunnel — negotiate a relay tunnel for a named relay.
//!
//! Resolves the handle against the configured relay map and performs the
//! open-session exchange with the relay itself. Unknown handles are 404;
//! a relay that answers wrongly (or not at all) is a 502 — the registry
//! is fine, the relay is not.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::ApiState;

#[derive(Debug, Deserialize)]
pub struct TunnelQuery {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct TunnelResponse {
    pub name: String,
    pub address: String,
    pub port: u16,
}

pub async fn handle_tunnel(
    State(state): State<ApiState>,
    Query(query): Query<TunnelQuery>,
) -> Result<Json<TunnelResponse>, (StatusCode, String)> {
    let relay = state
        .registry
        .resolve_relay(&query.name)
        .ok_or((StatusCode::NOT_FOUND, "unknown relay".to_string()))?;

    match state.registry.open_relay_session(&relay).await {
        Ok(tunnel) => Ok(Json(TunnelResponse {
            name: query.name,
            address: tunnel.address,
            port: tunnel.port,
        })),
        Err(e) => {
            tracing::warn!(relay = %query.name, error = %e, "relay tunnel negotiation failed");
            Err((StatusCode::BAD_GATEWAY, "relay unavailable".to_string()))
        }
    }
}
