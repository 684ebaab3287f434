//! Session lifecycle engine.
//!
//! Every announcement lands here and is classified into one of three
//! transitions — Create, Update, Touch — or bounced with a typed
//! rejection. The engine owns the ordering: fingerprint, look up, rate
//! limit, validate, probe, persist. A per-identity lock serializes the
//! lookup-classify-persist sequence so two concurrent first announcements
//! for the same host cannot both observe "no existing record".

use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;

use waypoint_core::{HostMethod, IdentityKey, Session};

use crate::country::CountryResolver;
use crate::probe::Prober;
use crate::relay::{RelayDirectory, RelayError, RelayInfo};
use crate::store::{SessionStore, StoreError};
use crate::validation::SessionValidator;

/// Username substituted when the announcer leaves it empty. Applied
/// before fingerprinting — it shapes both digests.
pub const DEFAULT_USERNAME: &str = "Anonymous";

/// How an announcement was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Create,
    Update,
    Touch,
}

/// An inbound announcement, already decoded from the transport layer.
/// The source IP arrives separately — it is taken from the connection,
/// never from the client's own claims.
#[derive(Debug, Clone, Default)]
pub struct AnnounceRequest {
    pub username: String,
    pub core_name: String,
    pub core_version: String,
    pub game_name: String,
    pub game_crc: String,
    pub port: u16,
    pub relay_server: String,
    pub relay_session: String,
    pub has_password: bool,
    pub has_spectator_password: bool,
    pub force_relay: bool,
    pub client_version: String,
    pub frontend: String,
    pub subsystem_name: String,
    pub player_count: Option<i16>,
    pub spectator_count: Option<i16>,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    /// Validation failure. Never persisted; resubmit with corrected data.
    #[error("session rejected")]
    Rejected,

    /// Announcement arrived inside the rate-limit window. No mutation.
    #[error("rate limit reached")]
    RateLimited,

    /// The announcement carries no usable address or port.
    #[error("announcement is missing an address or port")]
    MissingEndpoint,

    /// The store failed during a transition. Infrastructure trouble,
    /// not bad input.
    #[error("session store failure")]
    Store(#[from] StoreError),

    /// Country resolution failed during a Create. No partial record is
    /// left behind.
    #[error("can't resolve country for {ip}: {reason}")]
    Country { ip: IpAddr, reason: String },
}

/// Staleness and rate-limit tuning.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// Sessions not refreshed within this window are stale: excluded
    /// from listings and eligible for purging.
    pub deadline_secs: u64,
    /// Minimum seconds between accepted mutations of one session.
    pub rate_limit_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            deadline_secs: 60,
            rate_limit_secs: 5,
        }
    }
}

/// The registry — orchestrates validation, probing, relay resolution,
/// and persistence for every announcement.
pub struct SessionRegistry {
    store: Arc<dyn SessionStore>,
    country: Arc<dyn CountryResolver>,
    validator: Arc<SessionValidator>,
    relays: Arc<RelayDirectory>,
    prober: Prober,
    settings: SessionSettings,
    /// Per-identity guards held across lookup → classify → persist.
    locks: DashMap<IdentityKey, Arc<Mutex<()>>>,
}

impl SessionRegistry {
    pub fn new(
        store: Arc<dyn SessionStore>,
        country: Arc<dyn CountryResolver>,
        validator: Arc<SessionValidator>,
        relays: Arc<RelayDirectory>,
        prober: Prober,
        settings: SessionSettings,
    ) -> Self {
        Self {
            store,
            country,
            validator,
            relays,
            prober,
            settings,
            locks: DashMap::new(),
        }
    }

    /// Handle one announcement from `source_ip`.
    ///
    /// Returns the post-persistence record, `RegistryError::Rejected` when
    /// validation fails, or `RegistryError::RateLimited` when the record
    /// was mutated too recently.
    pub async fn announce(
        &self,
        request: AnnounceRequest,
        source_ip: IpAddr,
    ) -> Result<Session, RegistryError> {
        let mut session = self.parse_request(request, source_ip);

        if session.ip.is_unspecified() || session.port == 0 {
            return Err(RegistryError::MissingEndpoint);
        }

        session.refresh_digests();

        let key = session.identity_key;
        let guard = self.lock_for(&key);
        let result = {
            let _held = guard.lock().await;
            self.apply(session).await
        };
        drop(guard);
        // Drop the lock entry once nothing is waiting on it, so the table
        // does not grow with every identity ever seen.
        self.locks
            .remove_if(&key, |_, value| Arc::strong_count(value) <= 1);
        result
    }

    /// The lookup-classify-persist sequence. Runs under the identity lock.
    async fn apply(&self, mut session: Session) -> Result<Session, RegistryError> {
        let saved = self.store.get_by_identity_key(&session.identity_key).await?;

        let transition = match &saved {
            None => Transition::Create,
            Some(s) if s.content_fingerprint != session.content_fingerprint => Transition::Update,
            Some(_) => Transition::Touch,
        };

        if let Some(saved) = &saved {
            let threshold = Utc::now() - Duration::seconds(self.settings.rate_limit_secs as i64);
            if saved.updated_at > threshold {
                return Err(RegistryError::RateLimited);
            }
        }

        if transition != Transition::Touch {
            if !self.validator.validate(&session) {
                return Err(RegistryError::Rejected);
            }
            // Annotation only — a dead or foreign endpoint still gets
            // its record, just flagged.
            self.prober.probe(&mut session).await;
        }

        let now = Utc::now();
        match transition {
            Transition::Create => {
                session.country = self
                    .country
                    .country_code(session.ip)
                    .map_err(|e| RegistryError::Country {
                        ip: session.ip,
                        reason: e.to_string(),
                    })?;
                session.created_at = now;
                session.updated_at = now;
                session = self.store.create(&session).await?;
                tracing::info!(
                    id = session.sequence_id,
                    key = %hex::encode(session.identity_key),
                    username = %session.username,
                    "session created"
                );
            }
            Transition::Update => {
                // Classification guarantees saved exists here.
                let saved = saved.ok_or(StoreError::NotFound)?;
                session.sequence_id = saved.sequence_id;
                session.country = saved.country;
                session.created_at = saved.created_at;
                session.updated_at = now;
                self.store.update(&session).await?;
                tracing::debug!(id = session.sequence_id, "session updated");
            }
            Transition::Touch => {
                let saved = saved.ok_or(StoreError::NotFound)?;
                self.store.touch(&session.identity_key, now).await?;
                session = saved;
                session.updated_at = now;
                tracing::trace!(id = session.sequence_id, "session touched");
            }
        }

        Ok(session)
    }

    /// All sessions still inside the staleness window, ordered by
    /// username ascending.
    pub async fn list(&self) -> Result<Vec<Session>, RegistryError> {
        Ok(self.store.list_since(self.deadline()).await?)
    }

    /// Look up one session by its public sequence id.
    pub async fn get(&self, sequence_id: i32) -> Result<Option<Session>, RegistryError> {
        Ok(self.store.get_by_sequence_id(sequence_id).await?)
    }

    /// Remove every session whose last refresh fell behind the deadline.
    /// Returns the number of sessions removed.
    pub async fn purge_old(&self) -> Result<u64, RegistryError> {
        Ok(self.store.purge_older_than(self.deadline()).await?)
    }

    /// Resolve a relay handle to its configured endpoint.
    pub fn resolve_relay(&self, handle: &str) -> Option<RelayInfo> {
        self.relays.resolve(handle)
    }

    /// Negotiate a fresh tunnel on a resolved relay.
    pub async fn open_relay_session(&self, relay: &RelayInfo) -> Result<RelayInfo, RelayError> {
        self.relays.open_session(relay).await
    }

    /// The separate source-address predicate; the transport layer decides
    /// when to apply it.
    pub fn ip_allowed(&self, ip: IpAddr) -> bool {
        self.validator.ip_allowed(ip)
    }

    fn deadline(&self) -> DateTime<Utc> {
        Utc::now() - Duration::seconds(self.settings.deadline_secs as i64)
    }

    /// Turn a raw request into a comparable session record.
    ///
    /// Relay hosting is settled here, before fingerprinting, because the
    /// host method, relay handle, and relay token are fingerprint inputs.
    /// A handle that does not resolve silently falls back to non-relay
    /// hosting rather than rejecting the announcement.
    fn parse_request(&self, request: AnnounceRequest, source_ip: IpAddr) -> Session {
        let username = if request.username.is_empty() {
            DEFAULT_USERNAME.to_string()
        } else {
            request.username
        };

        let mut host_method = HostMethod::Unknown;
        let mut relay_handle = String::new();
        let mut relay_addr = String::new();
        let mut relay_port = 0u16;
        let mut relay_session = String::new();

        if request.force_relay
            && !request.relay_server.is_empty()
            && !request.relay_session.is_empty()
        {
            if let Some(relay) = self.relays.resolve(&request.relay_server) {
                host_method = HostMethod::Relay;
                relay_handle = request.relay_server;
                relay_addr = relay.address;
                relay_port = relay.port;
                relay_session = request.relay_session;
            }
        }

        let now = Utc::now();
        Session {
            identity_key: [0u8; 32],
            content_fingerprint: [0u8; 32],
            sequence_id: 0,
            username,
            country: String::new(),
            game_name: request.game_name,
            game_crc: request.game_crc.to_uppercase(),
            core_name: request.core_name,
            core_version: request.core_version,
            subsystem_name: request.subsystem_name,
            client_version: request.client_version,
            frontend: request.frontend,
            ip: source_ip,
            port: request.port,
            host_method,
            relay_handle,
            relay_addr,
            relay_port,
            relay_session,
            has_password: request.has_password,
            has_spectator_password: request.has_spectator_password,
            connectable: false,
            protocol_ok: false,
            player_count: request.player_count,
            spectator_count: request.spectator_count,
            created_at: now,
            updated_at: now,
        }
    }

    fn lock_for(&self, key: &IdentityKey) -> Arc<Mutex<()>> {
        self.locks
            .entry(*key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }
}
