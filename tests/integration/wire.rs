//! Wire-level behavior against real loopback endpoints: the relay
//! open-session exchange and the probe's edge cases.

use crate::*;

use std::collections::HashMap;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use waypoint_core::wire::{RELAY_OPEN_ACK, RELAY_OPEN_REQUEST};
use waypoint_services::{RelayDirectory, RelayError};

/// A relay double: accepts one connection, checks the open command, and
/// answers with the acknowledgement and the given port.
async fn spawn_relay(reply_port: u32) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut command = [0u8; 8];
        socket.read_exact(&mut command).await.unwrap();
        assert_eq!(command, RELAY_OPEN_REQUEST);

        let mut reply = Vec::with_capacity(12);
        reply.extend_from_slice(&RELAY_OPEN_ACK);
        reply.extend_from_slice(&reply_port.to_be_bytes());
        socket.write_all(&reply).await.unwrap();
    });
    port
}

fn directory_for(port: u16) -> RelayDirectory {
    let mut servers = HashMap::new();
    servers.insert("local".to_string(), format!("127.0.0.1:{port}"));
    RelayDirectory::with_timeout(servers, std::time::Duration::from_millis(500))
}

#[tokio::test]
async fn relay_open_session_negotiates_a_port() {
    let relay_port = spawn_relay(55435).await;
    let directory = directory_for(relay_port);

    let info = directory.resolve("local").unwrap();
    let tunnel = directory.open_session(&info).await.unwrap();
    assert_eq!(tunnel.address, "127.0.0.1");
    assert_eq!(tunnel.port, 55435);
}

#[tokio::test]
async fn relay_bad_reply_is_an_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut command = [0u8; 8];
        socket.read_exact(&mut command).await.unwrap();
        socket.write_all(&[0xFFu8; 12]).await.unwrap();
    });

    let directory = directory_for(port);
    let info = directory.resolve("local").unwrap();
    let err = directory.open_session(&info).await.unwrap_err();
    assert!(matches!(err, RelayError::BadReply { .. }));
}

#[tokio::test]
async fn relay_connection_refused_is_an_io_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let directory = directory_for(port);
    let info = directory.resolve("local").unwrap();
    let err = directory.open_session(&info).await.unwrap_err();
    assert!(matches!(err, RelayError::Io { .. }));
}

#[tokio::test]
async fn relay_that_never_answers_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let hold = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        drop(socket);
    });

    let directory = directory_for(port);
    let info = directory.resolve("local").unwrap();
    let err = directory.open_session(&info).await.unwrap_err();
    assert!(matches!(err, RelayError::Timeout { .. }));
    hold.abort();
}

/// A host that answers the probe with a truncated magic is connectable
/// but not protocol-compatible.
#[tokio::test]
async fn short_probe_reply_marks_incompatible() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut token = [0u8; 4];
        socket.read_exact(&mut token).await.unwrap();
        socket.write_all(b"RA").await.unwrap();
        // Close right away so the read completes short.
    });

    let registry = test_registry(MemoryStore::new(), HashMap::new(), 5);
    let session = registry
        .announce(announce_request("zelda", port), "127.0.0.1".parse().unwrap())
        .await
        .unwrap();

    assert!(session.connectable);
    assert!(!session.protocol_ok);
}

/// The session-full answer still counts as protocol-compatible.
#[tokio::test]
async fn full_session_reply_is_compatible() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut token = [0u8; 4];
        socket.read_exact(&mut token).await.unwrap();
        socket.write_all(b"FULL").await.unwrap();
    });

    let registry = test_registry(MemoryStore::new(), HashMap::new(), 5);
    let session = registry
        .announce(announce_request("zelda", port), "127.0.0.1".parse().unwrap())
        .await
        .unwrap();

    assert!(session.connectable);
    assert!(session.protocol_ok);
}
