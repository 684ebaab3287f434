//! Relay directory — named relay handles and tunnel negotiation.
//!
//! The handle map comes from configuration, is immutable after startup,
//! and is parsed on every resolution so a bad entry degrades to "no relay
//! available" instead of poisoning the process. Opening a tunnel speaks
//! the frozen 8/12-byte exchange from `waypoint_core::wire`.

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use waypoint_core::wire::{parse_relay_open_reply, RELAY_OPEN_REPLY_LEN, RELAY_OPEN_REQUEST};

/// A resolved relay endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayInfo {
    pub address: String,
    pub port: u16,
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("can't reach relay at '{address}': {source}")]
    Io {
        address: String,
        source: std::io::Error,
    },

    #[error("timed out talking to relay at '{address}'")]
    Timeout { address: String },

    #[error("relay at '{address}' sent an invalid reply: {reply}")]
    BadReply { address: String, reply: String },
}

/// The configured relay handle map. Read-only after initialization.
pub struct RelayDirectory {
    servers: HashMap<String, String>,
    io_timeout: Duration,
}

impl RelayDirectory {
    pub fn new(servers: HashMap<String, String>) -> Self {
        Self::with_timeout(servers, Duration::from_secs(10))
    }

    pub fn with_timeout(servers: HashMap<String, String>, io_timeout: Duration) -> Self {
        Self {
            servers,
            io_timeout,
        }
    }

    /// Resolve a handle to an endpoint.
    ///
    /// The "address:port" entry is split on the last colon; the address
    /// must be non-empty and the port in 1..=65535. An unknown handle or
    /// a malformed entry yields None — callers treat that as "no relay
    /// available", never as a request-aborting error.
    pub fn resolve(&self, handle: &str) -> Option<RelayInfo> {
        let entry = self.servers.get(handle)?;
        let (address, port) = entry.rsplit_once(':')?;
        if address.is_empty() {
            return None;
        }
        let port: u16 = port.parse().ok()?;
        if port == 0 {
            return None;
        }
        Some(RelayInfo {
            address: address.to_string(),
            port,
        })
    }

    /// Open a new tunnel on a resolved relay.
    ///
    /// Sends the fixed open command and reads the 12-byte reply carrying
    /// the allocated port. Every I/O step is bounded by the directory's
    /// timeout. Returns the relay address with the allocated port.
    pub async fn open_session(&self, relay: &RelayInfo) -> Result<RelayInfo, RelayError> {
        let address = format!("{}:{}", relay.address, relay.port);

        let mut stream = timeout(self.io_timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| RelayError::Timeout {
                address: address.clone(),
            })?
            .map_err(|source| RelayError::Io {
                address: address.clone(),
                source,
            })?;

        timeout(self.io_timeout, stream.write_all(&RELAY_OPEN_REQUEST))
            .await
            .map_err(|_| RelayError::Timeout {
                address: address.clone(),
            })?
            .map_err(|source| RelayError::Io {
                address: address.clone(),
                source,
            })?;

        let mut reply = [0u8; RELAY_OPEN_REPLY_LEN];
        timeout(self.io_timeout, stream.read_exact(&mut reply))
            .await
            .map_err(|_| RelayError::Timeout {
                address: address.clone(),
            })?
            .map_err(|source| RelayError::Io {
                address: address.clone(),
                source,
            })?;

        match parse_relay_open_reply(&reply) {
            Some(port) => {
                tracing::debug!(relay = %relay.address, port, "relay tunnel opened");
                Ok(RelayInfo {
                    address: relay.address.clone(),
                    port,
                })
            }
            None => Err(RelayError::BadReply {
                address,
                reply: hex::encode(reply),
            }),
        }
    }
}
