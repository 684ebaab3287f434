//! Listing, lookup, and purge behavior through the engine.

use crate::*;

use std::collections::HashMap;

use chrono::{Duration as Age, Utc};
use waypoint_services::SessionStore;

#[tokio::test]
async fn list_is_ordered_by_username() {
    let store = MemoryStore::new();
    let registry = test_registry(store.clone(), HashMap::new(), 0);
    let ip = "192.168.1.2".parse().unwrap();

    for (name, port) in [("zelda", 55355), ("link", 55356), ("Mario", 55357)] {
        registry.announce(announce_request(name, port), ip).await.unwrap();
    }

    let names: Vec<String> = registry
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.username)
        .collect();
    assert_eq!(names, vec!["Mario", "link", "zelda"]);
}

#[tokio::test]
async fn stale_sessions_drop_out_of_listings() {
    let store = MemoryStore::new();
    let registry = test_registry(store.clone(), HashMap::new(), 0);
    let ip = "192.168.1.2".parse().unwrap();

    let fresh = registry
        .announce(announce_request("fresh", 55355), ip)
        .await
        .unwrap();
    let old = registry
        .announce(announce_request("old", 55356), ip)
        .await
        .unwrap();

    // Age one record past the 60s staleness window.
    let mut aged = old.clone();
    aged.updated_at = Utc::now() - Age::seconds(120);
    store.update(&aged).await.unwrap();

    let listed = registry.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].username, "fresh");

    // The stale record still exists until the purge job runs.
    assert_eq!(store.len(), 2);
    assert_eq!(registry.purge_old().await.unwrap(), 1);
    assert_eq!(store.len(), 1);
    assert!(store
        .get_by_identity_key(&fresh.identity_key)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn purge_on_empty_registry_is_a_no_op() {
    let registry = test_registry(MemoryStore::new(), HashMap::new(), 0);
    assert_eq!(registry.purge_old().await.unwrap(), 0);
}

#[tokio::test]
async fn lookup_by_sequence_id_distinguishes_absent() {
    let registry = test_registry(MemoryStore::new(), HashMap::new(), 0);
    let ip = "192.168.1.2".parse().unwrap();

    let session = registry
        .announce(announce_request("zelda", 55355), ip)
        .await
        .unwrap();

    let found = registry.get(session.sequence_id).await.unwrap();
    assert_eq!(found.unwrap().username, "zelda");

    // Absent is a clean None, not an error.
    assert!(registry.get(4711).await.unwrap().is_none());
}

#[tokio::test]
async fn sequence_ids_stay_unique_across_hosts() {
    let registry = test_registry(MemoryStore::new(), HashMap::new(), 0);
    let ip = "192.168.1.2".parse().unwrap();

    let mut seen = std::collections::HashSet::new();
    for port in 55355..55360 {
        let session = registry
            .announce(announce_request("zelda", port), ip)
            .await
            .unwrap();
        assert!(seen.insert(session.sequence_id));
    }
}
