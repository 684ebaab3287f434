//! POST /add — announce a hosted session.
//!
//! The reply is a plaintext key=value listing, the format deployed game
//! clients parse. Typed lifecycle outcomes map onto status codes: 400 for
//! rejected/malformed announcements, 429 inside the rate-limit window,
//! 500 when a dependency fails.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Form, State};
use axum::http::{HeaderMap, StatusCode};
use serde::{Deserialize, Deserializer};

use waypoint_core::Session;
use waypoint_services::{AnnounceRequest, RegistryError};

use super::{client_ip, ApiState};

/// The announce form. Everything is optional on the wire; missing fields
/// decay to their defaults and the engine judges the result.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AnnounceForm {
    pub username: String,
    pub core_name: String,
    pub core_version: String,
    pub game_name: String,
    pub game_crc: String,
    pub port: u16,
    pub relay_server: String,
    pub relay_session: String,
    #[serde(deserialize_with = "form_bool")]
    pub has_password: bool,
    #[serde(deserialize_with = "form_bool")]
    pub has_spectator_password: bool,
    #[serde(deserialize_with = "form_bool")]
    pub force_relay: bool,
    pub client_version: String,
    pub frontend: String,
    pub subsystem_name: String,
    pub player_count: Option<i16>,
    pub spectator_count: Option<i16>,
}

impl From<AnnounceForm> for AnnounceRequest {
    fn from(form: AnnounceForm) -> Self {
        AnnounceRequest {
            username: form.username,
            core_name: form.core_name,
            core_version: form.core_version,
            game_name: form.game_name,
            game_crc: form.game_crc,
            port: form.port,
            relay_server: form.relay_server,
            relay_session: form.relay_session,
            has_password: form.has_password,
            has_spectator_password: form.has_spectator_password,
            force_relay: form.force_relay,
            client_version: form.client_version,
            frontend: form.frontend,
            subsystem_name: form.subsystem_name,
            player_count: form.player_count,
            spectator_count: form.spectator_count,
        }
    }
}

/// Game clients send booleans as "1"/"0".
fn form_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(matches!(raw.as_str(), "1" | "true"))
}

pub async fn handle_announce(
    State(state): State<ApiState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Form(form): Form<AnnounceForm>,
) -> Result<String, (StatusCode, String)> {
    let ip = client_ip(&headers, peer);

    if !state.registry.ip_allowed(ip) {
        tracing::warn!(%ip, "announcement from blacklisted address refused");
        return Err((StatusCode::BAD_REQUEST, "session rejected".to_string()));
    }

    match state.registry.announce(form.into(), ip).await {
        Ok(session) => Ok(format!("status=OK\n{}", render_session_text(&session))),
        Err(RegistryError::Rejected) => {
            tracing::info!(%ip, "session rejected");
            Err((StatusCode::BAD_REQUEST, "session rejected".to_string()))
        }
        Err(RegistryError::RateLimited) => {
            Err((StatusCode::TOO_MANY_REQUESTS, "rate limit reached".to_string()))
        }
        Err(RegistryError::MissingEndpoint) => Err((
            StatusCode::BAD_REQUEST,
            "address or port not set".to_string(),
        )),
        Err(e) => {
            tracing::error!(%ip, error = %e, "announcement failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            ))
        }
    }
}

/// Render a session in the plaintext key=value format clients expect.
pub(crate) fn render_session_text(s: &Session) -> String {
    format!(
        "id={}\nusername={}\ncore_name={}\ngame_name={}\ngame_crc={}\ncore_version={}\nip={}\nport={}\nhost_method={}\nhas_password={}\nhas_spectator_password={}\nclient_version={}\nfrontend={}\nsubsystem_name={}\ncountry={}\nconnectable={}\nprotocol_ok={}\n",
        s.sequence_id,
        s.username,
        s.core_name,
        s.game_name,
        s.game_crc.to_uppercase(),
        s.core_version,
        s.ip,
        s.port,
        s.host_method.as_u8(),
        s.has_password as u8,
        s.has_spectator_password as u8,
        s.client_version,
        s.frontend,
        s.subsystem_name,
        s.country.to_uppercase(),
        s.connectable as u8,
        s.protocol_ok as u8,
    )
}
