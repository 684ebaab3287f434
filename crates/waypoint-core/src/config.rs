//! Configuration system for Waypoint.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $WAYPOINT_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/waypoint/config.toml
//!   3. ~/.config/waypoint/config.toml

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaypointConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub geoip: GeoIpConfig,
    pub session: SessionTuning,
    /// Relay handles to "address:port" endpoints. Immutable after load.
    pub relays: HashMap<String, String>,
    pub blacklist: BlacklistConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP API binds to.
    pub bind_addr: String,
    pub api_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite session database. Created on first run.
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoIpConfig {
    /// Path to a GeoIP2 country database. Empty = country resolution off.
    pub database_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionTuning {
    /// Sessions not refreshed within this window are stale.
    pub deadline_secs: u64,
    /// Minimum seconds between accepted mutations of one session.
    pub rate_limit_secs: u64,
    /// How often the purge job removes stale sessions.
    pub purge_interval_secs: u64,
    /// Reachability probe connect timeout.
    pub probe_connect_timeout_secs: u64,
    /// Reachability probe read timeout.
    pub probe_read_timeout_secs: u64,
    /// Relay negotiation I/O timeout.
    pub relay_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlacklistConfig {
    /// Regular expressions rejected in any free-text field.
    pub strings: Vec<String>,
    /// Source addresses whose announcements are refused outright.
    pub ips: Vec<String>,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for WaypointConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            geoip: GeoIpConfig::default(),
            session: SessionTuning::default(),
            relays: HashMap::new(),
            blacklist: BlacklistConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            api_port: 9100,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: data_dir().join("sessions.db"),
        }
    }
}

impl Default for GeoIpConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::new(),
        }
    }
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            deadline_secs: 60,
            rate_limit_secs: 5,
            purge_interval_secs: 120,
            probe_connect_timeout_secs: 10,
            probe_read_timeout_secs: 10,
            relay_timeout_secs: 10,
        }
    }
}

impl Default for BlacklistConfig {
    fn default() -> Self {
        Self {
            strings: Vec::new(),
            ips: Vec::new(),
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("waypoint")
}

pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("waypoint")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl WaypointConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            WaypointConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("WAYPOINT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&WaypointConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply WAYPOINT_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("WAYPOINT_SERVER__BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Ok(v) = std::env::var("WAYPOINT_SERVER__API_PORT") {
            if let Ok(p) = v.parse() {
                self.server.api_port = p;
            }
        }
        if let Ok(v) = std::env::var("WAYPOINT_DATABASE__PATH") {
            self.database.path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("WAYPOINT_GEOIP__DATABASE_PATH") {
            self.geoip.database_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("WAYPOINT_SESSION__DEADLINE_SECS") {
            if let Ok(n) = v.parse() {
                self.session.deadline_secs = n;
            }
        }
        if let Ok(v) = std::env::var("WAYPOINT_SESSION__RATE_LIMIT_SECS") {
            if let Ok(n) = v.parse() {
                self.session.rate_limit_secs = n;
            }
        }
        if let Ok(v) = std::env::var("WAYPOINT_SESSION__PURGE_INTERVAL_SECS") {
            if let Ok(n) = v.parse() {
                self.session.purge_interval_secs = n;
            }
        }
    }
}
