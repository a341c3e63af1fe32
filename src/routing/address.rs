//! Backend addresses.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A resolved backend `host:port` pair.
///
/// The host may be an IP literal or a hostname; the transport resolves it at
/// connect time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendAddr {
    host: String,
    port: u16,
}

impl BackendAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for BackendAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// An address value that does not parse as `host:port`.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid backend address: {0}")]
pub struct InvalidBackendAddr(pub String);

impl FromStr for BackendAddr {
    type Err = InvalidBackendAddr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| InvalidBackendAddr(s.to_string()))?;
        if host.is_empty() {
            return Err(InvalidBackendAddr(s.to_string()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| InvalidBackendAddr(s.to_string()))?;
        Ok(Self::new(host, port))
    }
}
