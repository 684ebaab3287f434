//! The session entity and its two digests.
//!
//! A session is one advertised game host, keyed by who is hosting and
//! where. Two BLAKE3 XOF digests are derived from it:
//!   1. Identity key — username + address + port. The primary key. Two
//!      announcements from the same host always collide to one record.
//!   2. Content fingerprint — every mutable, player-visible field. Pure
//!      change detection: same fingerprint means "nothing changed".
//!
//! Both digests are pure functions of their documented input fields and
//! nothing else. The identity key doubles as the database primary key, so
//! the field order and encoding below are a compatibility contract: any
//! reimplementation must hash the same bytes in the same order or the same
//! logical session silently maps to a different record.

use std::net::IpAddr;

use chrono::{DateTime, Utc};

/// A 32-byte digest used as a session's primary key.
pub type IdentityKey = [u8; 32];

/// How the announcer says it is reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostMethod {
    #[default]
    Unknown = 0,
    Manual = 1,
    Upnp = 2,
    /// Peers connect through a third-party relay instead of directly.
    Relay = 3,
}

impl HostMethod {
    /// Numeric discriminant — stable, used in digests and wire output.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Inverse of `as_u8`, for records read back from storage.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Unknown),
            1 => Some(Self::Manual),
            2 => Some(Self::Upnp),
            3 => Some(Self::Relay),
            _ => None,
        }
    }
}

/// One advertised game session.
///
/// Created on first sighting of an identity key, mutated in place on every
/// later sighting, deleted once `updated_at` falls behind the staleness
/// deadline. The registry keeps no history.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Primary key, derived from (username, ip, port). Never recomputed
    /// from mutable fields.
    pub identity_key: IdentityKey,
    /// Digest of the mutable field set. Identical fingerprint → Touch,
    /// differing fingerprint → Update.
    pub content_fingerprint: IdentityKey,
    /// Small public id assigned by the store at create, used for lookup
    /// and listing by clients.
    pub sequence_id: i32,

    pub username: String,
    /// Two-letter country code resolved from the source IP at create.
    /// Empty for private/unroutable addresses.
    pub country: String,
    pub game_name: String,
    pub game_crc: String,
    pub core_name: String,
    pub core_version: String,
    pub subsystem_name: String,
    pub client_version: String,
    pub frontend: String,

    pub ip: IpAddr,
    pub port: u16,
    pub host_method: HostMethod,
    /// Configured relay handle; empty unless host method is Relay.
    pub relay_handle: String,
    pub relay_addr: String,
    pub relay_port: u16,
    /// Opaque token the announcer obtained from the relay.
    pub relay_session: String,

    pub has_password: bool,
    pub has_spectator_password: bool,

    /// Set by the reachability prober, never by the client.
    pub connectable: bool,
    pub protocol_ok: bool,

    pub player_count: Option<i16>,
    pub spectator_count: Option<i16>,

    /// Immutable after creation.
    pub created_at: DateTime<Utc>,
    /// Bumped on every successful transition. Always >= created_at.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Derive the identity key: XOF over username, raw IP octets, and the
    /// port as decimal text, in that order.
    pub fn compute_identity_key(&self) -> IdentityKey {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.username.as_bytes());
        update_ip(&mut hasher, self.ip);
        hasher.update(self.port.to_string().as_bytes());
        finalize(hasher)
    }

    /// Derive the content fingerprint over the mutable field set.
    ///
    /// Inputs, in order: username, game name, game CRC, core name, core
    /// version, subsystem name, client version, frontend, raw IP octets,
    /// port, host method discriminant, relay handle, relay session token,
    /// has-password, has-spectator-password. Numbers as decimal text,
    /// booleans as "true"/"false". Insensitive to the identity key, the
    /// sequence id, timestamps, and its own prior value.
    pub fn compute_content_fingerprint(&self) -> IdentityKey {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.username.as_bytes());
        hasher.update(self.game_name.as_bytes());
        hasher.update(self.game_crc.as_bytes());
        hasher.update(self.core_name.as_bytes());
        hasher.update(self.core_version.as_bytes());
        hasher.update(self.subsystem_name.as_bytes());
        hasher.update(self.client_version.as_bytes());
        hasher.update(self.frontend.as_bytes());
        update_ip(&mut hasher, self.ip);
        hasher.update(self.port.to_string().as_bytes());
        hasher.update(self.host_method.as_u8().to_string().as_bytes());
        hasher.update(self.relay_handle.as_bytes());
        hasher.update(self.relay_session.as_bytes());
        hasher.update(bool_text(self.has_password));
        hasher.update(bool_text(self.has_spectator_password));
        finalize(hasher)
    }

    /// Recompute and store both digests.
    pub fn refresh_digests(&mut self) {
        self.identity_key = self.compute_identity_key();
        self.content_fingerprint = self.compute_content_fingerprint();
    }
}

/// Raw IP octets: 4 bytes for v4, 16 for v6. No textual form — "1.2.3.4"
/// and its v6-mapped spelling must not hash alike by accident of printing.
fn update_ip(hasher: &mut blake3::Hasher, ip: IpAddr) {
    match ip {
        IpAddr::V4(v4) => {
            hasher.update(&v4.octets());
        }
        IpAddr::V6(v6) => {
            hasher.update(&v6.octets());
        }
    }
}

fn bool_text(b: bool) -> &'static [u8] {
    if b {
        b"true"
    } else {
        b"false"
    }
}

/// Read 32 bytes from the hasher's extendable output.
fn finalize(hasher: blake3::Hasher) -> IdentityKey {
    let mut digest = [0u8; 32];
    hasher.finalize_xof().fill(&mut digest);
    digest
}
