//! Country resolution for announced sessions.
//!
//! The registry only needs one fact per source address: the two-letter
//! ISO country code shown in listings. `CountryResolver` is the boundary;
//! the GeoIP2 database backing is an implementation detail the lifecycle
//! engine never sees.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use maxminddb::{geoip2, MaxMindDBError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CountryError {
    #[error("can't open geoip database {path}: {source}")]
    Open {
        path: PathBuf,
        source: MaxMindDBError,
    },

    #[error("can't lookup country for {ip}: {source}")]
    Lookup { ip: IpAddr, source: MaxMindDBError },
}

/// Resolves a source address to a two-letter country code.
///
/// An empty code means the address is private or otherwise unroutable —
/// that is a normal answer, not an error.
pub trait CountryResolver: Send + Sync {
    fn country_code(&self, ip: IpAddr) -> Result<String, CountryError>;
}

/// GeoIP2 country database resolver.
pub struct GeoDbResolver {
    db: maxminddb::Reader<Vec<u8>>,
}

impl GeoDbResolver {
    /// Open a GeoIP2 country database file.
    pub fn open(path: &Path) -> Result<Self, CountryError> {
        let db = maxminddb::Reader::open_readfile(path).map_err(|source| CountryError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { db })
    }
}

impl CountryResolver for GeoDbResolver {
    fn country_code(&self, ip: IpAddr) -> Result<String, CountryError> {
        match self.db.lookup::<geoip2::Country>(ip) {
            Ok(record) => Ok(record
                .country
                .and_then(|c| c.iso_code)
                .unwrap_or_default()
                .to_string()),
            // Private and unroutable addresses are simply not in the
            // database — report them as "no country".
            Err(MaxMindDBError::AddressNotFoundError(_)) => Ok(String::new()),
            Err(source) => Err(CountryError::Lookup { ip, source }),
        }
    }
}

/// Resolver that answers every lookup with the same code.
///
/// Used when country resolution is disabled and in tests.
pub struct FixedResolver(pub String);

impl FixedResolver {
    /// A resolver that reports "no country" for every address.
    pub fn empty() -> Self {
        Self(String::new())
    }
}

impl CountryResolver for FixedResolver {
    fn country_code(&self, _ip: IpAddr) -> Result<String, CountryError> {
        Ok(self.0.clone())
    }
}
