//! Announcement lifecycle, end to end.

use crate::*;

use std::collections::HashMap;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use waypoint_core::HostMethod;
use waypoint_services::{RegistryError, SessionStore};

/// The canonical first-contact scenario: a fresh host announces, gets a
/// brand-new record with a computed identity, matching timestamps, a
/// country from the resolver, and no hosting method claimed.
#[tokio::test]
async fn first_announcement_end_to_end() {
    let store = MemoryStore::new();
    let registry = test_registry(store.clone(), HashMap::new(), 5);

    let session = registry
        .announce(
            announce_request("zelda", 55355),
            "192.168.1.2".parse().unwrap(),
        )
        .await
        .unwrap();

    assert_ne!(session.identity_key, [0u8; 32]);
    assert_eq!(session.identity_key, session.compute_identity_key());
    assert_eq!(session.sequence_id, 1);
    assert_eq!(session.created_at, session.updated_at);
    assert_eq!(session.country, "US");
    assert_eq!(session.host_method, HostMethod::Unknown);
    assert_eq!(session.game_name, "supergame");
    assert_eq!(session.game_crc, "FFFFFFFF");
    assert_eq!(store.len(), 1);
}

/// Touch then update: an identical re-announcement only moves the clock;
/// a changed one refreshes the record but keeps its origin facts.
#[tokio::test]
async fn touch_then_update_preserve_identity() {
    let store = MemoryStore::new();
    let registry = test_registry(store.clone(), HashMap::new(), 0);
    let ip = "192.168.1.2".parse().unwrap();

    let created = registry
        .announce(announce_request("zelda", 55355), ip)
        .await
        .unwrap();

    let touched = registry
        .announce(announce_request("zelda", 55355), ip)
        .await
        .unwrap();
    assert_eq!(touched.identity_key, created.identity_key);
    assert_eq!(touched.content_fingerprint, created.content_fingerprint);
    assert_eq!(touched.created_at, created.created_at);
    assert!(touched.updated_at > created.updated_at);

    let mut changed = announce_request("zelda", 55355);
    changed.game_name = "othergame".to_string();
    let updated = registry.announce(changed, ip).await.unwrap();
    assert_eq!(updated.identity_key, created.identity_key);
    assert_ne!(updated.content_fingerprint, created.content_fingerprint);
    assert_eq!(updated.sequence_id, created.sequence_id);
    assert_eq!(updated.country, created.country);
    assert_eq!(updated.created_at, created.created_at);

    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn rapid_reannouncement_is_rate_limited() {
    let store = MemoryStore::new();
    let registry = test_registry(store.clone(), HashMap::new(), 5);
    let ip = "192.168.1.2".parse().unwrap();

    registry
        .announce(announce_request("zelda", 55355), ip)
        .await
        .unwrap();

    let err = registry
        .announce(announce_request("zelda", 55355), ip)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::RateLimited));

    // A different host is unaffected by zelda's window.
    registry
        .announce(announce_request("link", 55356), ip)
        .await
        .unwrap();
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn rejected_create_leaves_no_trace() {
    let store = MemoryStore::new();
    let registry = test_registry(store.clone(), HashMap::new(), 5);

    let mut request = announce_request("badWordUser", 55355);
    request.game_crc = "FFFFFFFF".to_string();
    let err = registry
        .announce(request, "192.168.1.2".parse().unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, RegistryError::Rejected));
    assert!(store.is_empty());
}

/// A live loopback host that answers the probe correctly ends up marked
/// connectable and protocol-compatible.
#[tokio::test]
async fn probed_host_is_annotated() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut token = [0u8; 4];
        socket.read_exact(&mut token).await.unwrap();
        assert_eq!(&token, b"POKE");
        socket.write_all(b"RANP").await.unwrap();
    });

    let registry = test_registry(MemoryStore::new(), HashMap::new(), 5);
    let session = registry
        .announce(announce_request("zelda", port), "127.0.0.1".parse().unwrap())
        .await
        .unwrap();

    assert!(session.connectable);
    assert!(session.protocol_ok);
}

/// A host nobody answers for is still registered, merely flagged.
#[tokio::test]
async fn unreachable_host_is_still_registered() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let store = MemoryStore::new();
    let registry = test_registry(store.clone(), HashMap::new(), 5);
    let session = registry
        .announce(announce_request("zelda", port), "127.0.0.1".parse().unwrap())
        .await
        .unwrap();

    assert!(!session.connectable);
    assert_eq!(store.len(), 1);
}

/// Relay hosting: resolved handle populates the endpoint, no probe runs,
/// and a handle that fails to resolve falls back to direct hosting.
#[tokio::test]
async fn relay_hosting_resolves_or_falls_back() {
    let mut relays = HashMap::new();
    relays.insert("nyc".to_string(), "relay.example.net:55435".to_string());
    relays.insert("broken".to_string(), "relay.example.net".to_string());
    let registry = test_registry(MemoryStore::new(), relays, 0);
    let ip = "192.168.1.2".parse().unwrap();

    let mut request = announce_request("zelda", 55355);
    request.force_relay = true;
    request.relay_server = "nyc".to_string();
    request.relay_session = "token".to_string();
    let session = registry.announce(request, ip).await.unwrap();
    assert_eq!(session.host_method, HostMethod::Relay);
    assert_eq!(session.relay_addr, "relay.example.net");
    assert_eq!(session.relay_port, 55435);
    assert!(session.connectable);

    let mut request = announce_request("link", 55356);
    request.force_relay = true;
    request.relay_server = "broken".to_string();
    request.relay_session = "token".to_string();
    let session = registry.announce(request, ip).await.unwrap();
    assert_eq!(session.host_method, HostMethod::Unknown);
    assert!(session.relay_addr.is_empty());
}

#[tokio::test]
async fn blacklisted_source_ip_predicate() {
    let registry = test_registry(MemoryStore::new(), HashMap::new(), 5);
    assert!(!registry.ip_allowed("203.0.113.66".parse().unwrap()));
    assert!(registry.ip_allowed("192.168.1.2".parse().unwrap()));
}

/// Seed an aged record through the store, then verify the rate limiter
/// lets a genuine refresh through while the window stays closed for the
/// freshly-updated record.
#[tokio::test]
async fn aged_record_can_be_refreshed() {
    let store = MemoryStore::new();
    let registry = test_registry(store.clone(), HashMap::new(), 5);
    let ip = "192.168.1.2".parse().unwrap();

    let created = registry
        .announce(announce_request("zelda", 55355), ip)
        .await
        .unwrap();

    // Age the stored record past the rate-limit window.
    let mut aged = created.clone();
    aged.updated_at = chrono::Utc::now() - chrono::Duration::seconds(10);
    store.update(&aged).await.unwrap();

    let touched = registry
        .announce(announce_request("zelda", 55355), ip)
        .await
        .unwrap();
    assert!(touched.updated_at > aged.updated_at);
}
