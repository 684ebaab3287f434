//! Reachability prober — annotates sessions, never blocks them.
//!
//! Opens a direct TCP connection to the announced endpoint, pokes it with
//! the fixed probe token, and classifies the reply. The outcome only ever
//! flips the `connectable` / `protocol_ok` flags on the session; a host
//! that cannot be probed is still listed, just marked accordingly.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use waypoint_core::wire::{is_probe_ack, PROBE_TOKEN};
use waypoint_core::{HostMethod, Session};

/// Probe timeouts. Defaults match what deployed clients expect to wait.
#[derive(Debug, Clone, Copy)]
pub struct ProbeSettings {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(10),
        }
    }
}

pub struct Prober {
    settings: ProbeSettings,
}

impl Prober {
    pub fn new(settings: ProbeSettings) -> Self {
        Self { settings }
    }

    /// Probe the session's announced endpoint and set its
    /// `connectable` / `protocol_ok` flags.
    ///
    /// Relay-hosted sessions skip probing entirely — the relay already
    /// vouched for reachability when the tunnel was negotiated. A failed
    /// connect clears `connectable`; a reply that is short or not one of
    /// the recognized magics clears `protocol_ok`. A read error leaves
    /// both flags at their defaults.
    pub async fn probe(&self, session: &mut Session) {
        session.connectable = true;
        session.protocol_ok = true;

        if session.host_method == HostMethod::Relay {
            return;
        }

        let addr = SocketAddr::new(session.ip, session.port);
        let mut stream = match timeout(self.settings.connect_timeout, TcpStream::connect(addr)).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                tracing::debug!(%addr, error = %e, "session endpoint not connectable");
                session.connectable = false;
                return;
            }
            Err(_) => {
                tracing::debug!(%addr, "session endpoint connect timed out");
                session.connectable = false;
                return;
            }
        };

        // Write errors are ignored — the read below decides the outcome.
        let _ = stream.write_all(&PROBE_TOKEN).await;

        let mut magic = [0u8; 4];
        let read = match timeout(self.settings.read_timeout, stream.read(&mut magic)).await {
            Ok(Ok(n)) => n,
            // Read failure or timeout is inconclusive — keep the defaults.
            Ok(Err(_)) | Err(_) => return,
        };

        if read == 0 {
            return;
        }

        if read != magic.len() || !is_probe_ack(&magic) {
            session.protocol_ok = false;
        }
    }
}
