//! waypoint-services — the session registry domain.
//!
//! Validation, relay negotiation, reachability probing, country
//! resolution, and the lifecycle engine that ties them together over a
//! narrow store interface.

pub mod country;
pub mod lifecycle;
pub mod probe;
pub mod relay;
pub mod store;
pub mod validation;

pub use country::{CountryError, CountryResolver, FixedResolver, GeoDbResolver};
pub use lifecycle::{AnnounceRequest, RegistryError, SessionRegistry, SessionSettings, Transition};
pub use probe::{ProbeSettings, Prober};
pub use relay::{RelayDirectory, RelayError, RelayInfo};
pub use store::{MemoryStore, SessionStore, StoreError};
pub use validation::{SessionValidator, ValidatorError};
