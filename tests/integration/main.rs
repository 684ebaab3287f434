//! Waypoint integration test harness.
//!
//! End-to-end tests over the real lifecycle engine: in-memory store, a
//! fixed country resolver, and real TCP listeners on loopback standing in
//! for game hosts and relays. No external services, no privileges — these
//! run anywhere.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub use waypoint_services::{
    AnnounceRequest, FixedResolver, MemoryStore, ProbeSettings, Prober, RelayDirectory,
    SessionRegistry, SessionSettings, SessionValidator,
};

// ── Harness ───────────────────────────────────────────────────────────────────

/// Blacklist used across tests: a word rule, a prefix rule, and a
/// run-of-whitespace rule.
pub fn test_blacklist() -> Vec<String> {
    vec![
        ".*badWord.*".to_string(),
        "^prefixTest.*$".to_string(),
        r"\s{3,}".to_string(),
    ]
}

/// Build a registry over the given store.
///
/// Probe timeouts are short so tests pointing at dead endpoints settle
/// quickly; a zero rate limit lets repeat announcements through without
/// sleeping.
pub fn test_registry(
    store: MemoryStore,
    relays: HashMap<String, String>,
    rate_limit_secs: u64,
) -> SessionRegistry {
    let validator =
        SessionValidator::new(&test_blacklist(), &["203.0.113.66".to_string()]).unwrap();

    SessionRegistry::new(
        Arc::new(store),
        Arc::new(FixedResolver("US".to_string())),
        Arc::new(validator),
        Arc::new(RelayDirectory::with_timeout(
            relays,
            Duration::from_millis(500),
        )),
        Prober::new(ProbeSettings {
            connect_timeout: Duration::from_millis(100),
            read_timeout: Duration::from_millis(300),
        }),
        SessionSettings {
            deadline_secs: 60,
            rate_limit_secs,
        },
    )
}

/// A complete, valid announcement.
pub fn announce_request(username: &str, port: u16) -> AnnounceRequest {
    AnnounceRequest {
        username: username.to_string(),
        core_name: "unes".to_string(),
        core_version: "0.2.1".to_string(),
        game_name: "supergame".to_string(),
        game_crc: "FFFFFFFF".to_string(),
        port,
        client_version: "1.1.1".to_string(),
        frontend: "retro".to_string(),
        subsystem_name: "subsub".to_string(),
        ..AnnounceRequest::default()
    }
}

mod announce;
mod listing;
mod wire;
