//! Endpoint identity
//!
//! Cluster members are identified by their `host:port` pair; that identity is
//! what topology discovery, pruning, and redirect targets key on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A cluster member address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Host name or address
    pub host: String,
    /// Port
    pub port: u16,
}

impl Endpoint {
    /// Create a new endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Failure to parse a `host:port` pair.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid endpoint: {0:?}")]
pub struct InvalidEndpoint(pub String);

impl FromStr for Endpoint {
    type Err = InvalidEndpoint;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| InvalidEndpoint(s.to_string()))?;
        if host.is_empty() {
            return Err(InvalidEndpoint(s.to_string()));
        }
        let port = port.parse().map_err(|_| InvalidEndpoint(s.to_string()))?;
        Ok(Self::new(host, port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_round_trip() {
        let endpoint = Endpoint::new("127.0.0.1", 7000);
        assert_eq!(endpoint.to_string(), "127.0.0.1:7000");
        assert_eq!("127.0.0.1:7000".parse::<Endpoint>().unwrap(), endpoint);
    }

    #[test]
    fn test_identity_is_host_and_port() {
        assert_eq!(
            Endpoint::new("10.0.0.1", 7000),
            Endpoint::new("10.0.0.1", 7000)
        );
        assert_ne!(
            Endpoint::new("10.0.0.1", 7000),
            Endpoint::new("10.0.0.1", 7001)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("nohost".parse::<Endpoint>().is_err());
        assert!(":7000".parse::<Endpoint>().is_err());
        assert!("host:notaport".parse::<Endpoint>().is_err());
    }
}
