//! HTTP handlers — announce, list, lookup, tunnel.

pub mod announce;
pub mod list;
pub mod tunnel;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::http::HeaderMap;

use waypoint_services::SessionRegistry;

#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<SessionRegistry>,
}

// ── Shared helpers ────────────────────────────────────────────────────────────

/// Pick the announcing client's address.
///
/// Trusts X-Forwarded-For / X-Real-IP when a reverse proxy sets them,
/// falling back to the socket peer address. The client never supplies its
/// own address in the request body.
pub(crate) fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> IpAddr {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            if let Ok(ip) = first.trim().parse() {
                return ip;
            }
        }
    }
    if let Some(real) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        if let Ok(ip) = real.trim().parse() {
            return ip;
        }
    }
    peer.ip()
}

pub use announce::handle_announce;
pub use list::{handle_get, handle_list};
pub use tunnel::handle_tunnel;
