//! waypoint-core — session entity, fingerprinting, config, and wire constants.
//! All other Waypoint crates depend on this one.

pub mod config;
pub mod entity;
pub mod wire;

pub use entity::{HostMethod, IdentityKey, Session};
