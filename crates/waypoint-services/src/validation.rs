//! Input validation for announced sessions.
//!
//! Stateless after construction: length limits, an ASCII requirement on
//! free-text fields, and a configurable regex blacklist. The IP blacklist
//! is a separate predicate — callers decide where to apply it.

use std::net::IpAddr;

use regex::Regex;
use thiserror::Error;

use waypoint_core::Session;

#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("can't compile blacklist expression '{expr}': {source}")]
    BadExpression {
        expr: String,
        source: regex::Error,
    },

    #[error("can't parse ip blacklist entry '{0}'")]
    BadIp(String),
}

/// Compiled validation rules. Read-only after construction.
pub struct SessionValidator {
    string_blacklist: Vec<Regex>,
    ip_blacklist: Vec<IpAddr>,
}

impl SessionValidator {
    /// Compile the configured blacklists. A malformed expression or IP is
    /// a startup error, not something to discover on the first request.
    pub fn new(string_blacklist: &[String], ip_blacklist: &[String]) -> Result<Self, ValidatorError> {
        let mut patterns = Vec::with_capacity(string_blacklist.len());
        for entry in string_blacklist {
            let expr = Regex::new(entry).map_err(|source| ValidatorError::BadExpression {
                expr: entry.clone(),
                source,
            })?;
            patterns.push(expr);
        }

        let mut ips = Vec::with_capacity(ip_blacklist.len());
        for entry in ip_blacklist {
            let ip: IpAddr = entry
                .parse()
                .map_err(|_| ValidatorError::BadIp(entry.clone()))?;
            ips.push(ip);
        }

        Ok(Self {
            string_blacklist: patterns,
            ip_blacklist: ips,
        })
    }

    /// Validate an announced session. Boolean only — the caller surfaces
    /// the rejection and must not persist or probe a failed session.
    pub fn validate(&self, session: &Session) -> bool {
        if session.username.len() > 32
            || session.core_name.len() > 255
            || session.game_name.len() > 255
            || session.game_crc.len() != 8
            || session.client_version.len() > 32
            || session.core_version.len() > 255
            || session.subsystem_name.len() > 255
            || session.frontend.len() > 255
            || session.relay_session.len() > 32
        {
            return false;
        }

        self.clean_string(&session.username)
            && self.clean_string(&session.core_name)
            && self.clean_string(&session.core_version)
            && self.clean_string(&session.frontend)
            && self.clean_string(&session.subsystem_name)
            && self.clean_string(&session.client_version)
    }

    /// Check a free-text field: ASCII only, no blacklist match.
    /// Linear in the number of configured expressions.
    pub fn clean_string(&self, s: &str) -> bool {
        if !s.is_ascii() {
            return false;
        }
        !self.string_blacklist.iter().any(|re| re.is_match(s))
    }

    /// Exact-match check against the IP blacklist.
    pub fn ip_allowed(&self, ip: IpAddr) -> bool {
        !self.ip_blacklist.contains(&ip)
    }
}
