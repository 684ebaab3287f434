//! SQLite-backed session store.
//!
//! One table, identity key as the primary key, timestamps as unix
//! milliseconds. Listing order and deadline filters are pushed into SQL;
//! SQLite's default BINARY collation gives the case-sensitive username
//! ordering the listing contract asks for.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{named_params, Connection, OptionalExtension, Row};
use tokio::sync::Mutex;

use waypoint_core::{HostMethod, IdentityKey, Session};
use waypoint_services::{SessionStore, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    identity_key            BLOB PRIMARY KEY,
    content_fingerprint     BLOB NOT NULL,
    sequence_id             INTEGER NOT NULL UNIQUE,
    username                TEXT NOT NULL,
    country                 TEXT NOT NULL,
    game_name               TEXT NOT NULL,
    game_crc                TEXT NOT NULL,
    core_name               TEXT NOT NULL,
    core_version            TEXT NOT NULL,
    subsystem_name          TEXT NOT NULL,
    client_version          TEXT NOT NULL,
    frontend                TEXT NOT NULL,
    ip                      TEXT NOT NULL,
    port                    INTEGER NOT NULL,
    host_method             INTEGER NOT NULL,
    relay_handle            TEXT NOT NULL,
    relay_addr              TEXT NOT NULL,
    relay_port              INTEGER NOT NULL,
    relay_session           TEXT NOT NULL,
    has_password            INTEGER NOT NULL,
    has_spectator_password  INTEGER NOT NULL,
    connectable             INTEGER NOT NULL,
    protocol_ok             INTEGER NOT NULL,
    player_count            INTEGER,
    spectator_count         INTEGER,
    created_at              INTEGER NOT NULL,
    updated_at              INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sessions_updated_at ON sessions(updated_at);
";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the session database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(backend)?;
            }
        }
        let conn = Connection::open(path).map_err(backend)?;
        Self::init(conn)
    }

    /// Ephemeral database for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA).map_err(backend)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn create(&self, session: &Session) -> Result<Session, StoreError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO sessions (
                identity_key, content_fingerprint, sequence_id,
                username, country, game_name, game_crc, core_name, core_version,
                subsystem_name, client_version, frontend,
                ip, port, host_method, relay_handle, relay_addr, relay_port, relay_session,
                has_password, has_spectator_password, connectable, protocol_ok,
                player_count, spectator_count, created_at, updated_at
            ) VALUES (
                :identity_key, :content_fingerprint,
                (SELECT IFNULL(MAX(sequence_id), 0) + 1 FROM sessions),
                :username, :country, :game_name, :game_crc, :core_name, :core_version,
                :subsystem_name, :client_version, :frontend,
                :ip, :port, :host_method, :relay_handle, :relay_addr, :relay_port, :relay_session,
                :has_password, :has_spectator_password, :connectable, :protocol_ok,
                :player_count, :spectator_count, :created_at, :updated_at
            )",
            named_params! {
                ":identity_key": session.identity_key.as_slice(),
                ":content_fingerprint": session.content_fingerprint.as_slice(),
                ":username": session.username,
                ":country": session.country,
                ":game_name": session.game_name,
                ":game_crc": session.game_crc,
                ":core_name": session.core_name,
                ":core_version": session.core_version,
                ":subsystem_name": session.subsystem_name,
                ":client_version": session.client_version,
                ":frontend": session.frontend,
                ":ip": session.ip.to_string(),
                ":port": session.port,
                ":host_method": session.host_method.as_u8(),
                ":relay_handle": session.relay_handle,
                ":relay_addr": session.relay_addr,
                ":relay_port": session.relay_port,
                ":relay_session": session.relay_session,
                ":has_password": session.has_password,
                ":has_spectator_password": session.has_spectator_password,
                ":connectable": session.connectable,
                ":protocol_ok": session.protocol_ok,
                ":player_count": session.player_count,
                ":spectator_count": session.spectator_count,
                ":created_at": session.created_at.timestamp_millis(),
                ":updated_at": session.updated_at.timestamp_millis(),
            },
        )
        .map_err(insert_error)?;

        let sequence_id: i32 = conn
            .query_row(
                "SELECT sequence_id FROM sessions WHERE identity_key = ?1",
                [session.identity_key.as_slice()],
                |row| row.get(0),
            )
            .map_err(backend)?;

        let mut stored = session.clone();
        stored.sequence_id = sequence_id;
        Ok(stored)
    }

    async fn update(&self, session: &Session) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        let changed = conn
            .execute(
                "UPDATE sessions SET
                    content_fingerprint = :content_fingerprint,
                    username = :username, country = :country,
                    game_name = :game_name, game_crc = :game_crc,
                    core_name = :core_name, core_version = :core_version,
                    subsystem_name = :subsystem_name, client_version = :client_version,
                    frontend = :frontend, ip = :ip, port = :port,
                    host_method = :host_method, relay_handle = :relay_handle,
                    relay_addr = :relay_addr, relay_port = :relay_port,
                    relay_session = :relay_session,
                    has_password = :has_password,
                    has_spectator_password = :has_spectator_password,
                    connectable = :connectable, protocol_ok = :protocol_ok,
                    player_count = :player_count, spectator_count = :spectator_count,
                    updated_at = :updated_at
                 WHERE identity_key = :identity_key",
                named_params! {
                    ":identity_key": session.identity_key.as_slice(),
                    ":content_fingerprint": session.content_fingerprint.as_slice(),
                    ":username": session.username,
                    ":country": session.country,
                    ":game_name": session.game_name,
                    ":game_crc": session.game_crc,
                    ":core_name": session.core_name,
                    ":core_version": session.core_version,
                    ":subsystem_name": session.subsystem_name,
                    ":client_version": session.client_version,
                    ":frontend": session.frontend,
                    ":ip": session.ip.to_string(),
                    ":port": session.port,
                    ":host_method": session.host_method.as_u8(),
                    ":relay_handle": session.relay_handle,
                    ":relay_addr": session.relay_addr,
                    ":relay_port": session.relay_port,
                    ":relay_session": session.relay_session,
                    ":has_password": session.has_password,
                    ":has_spectator_password": session.has_spectator_password,
                    ":connectable": session.connectable,
                    ":protocol_ok": session.protocol_ok,
                    ":player_count": session.player_count,
                    ":spectator_count": session.spectator_count,
                    ":updated_at": session.updated_at.timestamp_millis(),
                },
            )
            .map_err(backend)?;

        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn touch(&self, key: &IdentityKey, when: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        let changed = conn
            .execute(
                "UPDATE sessions SET updated_at = ?1 WHERE identity_key = ?2",
                rusqlite::params![when.timestamp_millis(), key.as_slice()],
            )
            .map_err(backend)?;

        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn get_by_identity_key(
        &self,
        key: &IdentityKey,
    ) -> Result<Option<Session>, StoreError> {
        let conn = self.conn.lock().await;
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM sessions WHERE identity_key = ?1"),
            [key.as_slice()],
            row_to_session,
        )
        .optional()
        .map_err(backend)
    }

    async fn get_by_sequence_id(&self, id: i32) -> Result<Option<Session>, StoreError> {
        let conn = self.conn.lock().await;
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM sessions WHERE sequence_id = ?1"),
            [id],
            row_to_session,
        )
        .optional()
        .map_err(backend)
    }

    async fn list_since(&self, deadline: DateTime<Utc>) -> Result<Vec<Session>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM sessions WHERE updated_at > ?1 ORDER BY username"
            ))
            .map_err(backend)?;
        let rows = stmt
            .query_map([deadline.timestamp_millis()], row_to_session)
            .map_err(backend)?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row.map_err(backend)?);
        }
        Ok(sessions)
    }

    async fn purge_older_than(&self, deadline: DateTime<Utc>) -> Result<u64, StoreError> {
        let conn = self.conn.lock().await;
        let removed = conn
            .execute(
                "DELETE FROM sessions WHERE updated_at < ?1",
                [deadline.timestamp_millis()],
            )
            .map_err(backend)?;
        Ok(removed as u64)
    }
}

const COLUMNS: &str = "identity_key, content_fingerprint, sequence_id, \
    username, country, game_name, game_crc, core_name, core_version, \
    subsystem_name, client_version, frontend, ip, port, host_method, \
    relay_handle, relay_addr, relay_port, relay_session, has_password, \
    has_spectator_password, connectable, protocol_ok, player_count, \
    spectator_count, created_at, updated_at";

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        identity_key: digest_column(row, 0)?,
        content_fingerprint: digest_column(row, 1)?,
        sequence_id: row.get(2)?,
        username: row.get(3)?,
        country: row.get(4)?,
        game_name: row.get(5)?,
        game_crc: row.get(6)?,
        core_name: row.get(7)?,
        core_version: row.get(8)?,
        subsystem_name: row.get(9)?,
        client_version: row.get(10)?,
        frontend: row.get(11)?,
        ip: row
            .get::<_, String>(12)?
            .parse()
            .map_err(|_| bad_column(12, "ip"))?,
        port: row.get(13)?,
        host_method: HostMethod::from_u8(row.get(14)?)
            .ok_or_else(|| bad_column(14, "host_method"))?,
        relay_handle: row.get(15)?,
        relay_addr: row.get(16)?,
        relay_port: row.get(17)?,
        relay_session: row.get(18)?,
        has_password: row.get(19)?,
        has_spectator_password: row.get(20)?,
        connectable: row.get(21)?,
        protocol_ok: row.get(22)?,
        player_count: row.get(23)?,
        spectator_count: row.get(24)?,
        created_at: timestamp_column(row, 25)?,
        updated_at: timestamp_column(row, 26)?,
    })
}

fn digest_column(row: &Row<'_>, index: usize) -> rusqlite::Result<IdentityKey> {
    let bytes: Vec<u8> = row.get(index)?;
    bytes.try_into().map_err(|_| bad_column(index, "digest"))
}

fn timestamp_column(row: &Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let millis: i64 = row.get(index)?;
    DateTime::from_timestamp_millis(millis).ok_or_else(|| bad_column(index, "timestamp"))
}

fn bad_column(index: usize, expected: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        rusqlite::types::Type::Blob,
        format!("invalid {expected} column").into(),
    )
}

fn backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn insert_error(e: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(failure, _) = &e {
        if failure.code == rusqlite::ErrorCode::ConstraintViolation {
            return StoreError::DuplicateIdentity;
        }
    }
    backend(e)
}
