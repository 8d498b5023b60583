//! Parsing of `host[:port]` server addresses

use std::fmt;
use std::str::FromStr;

use super::QueryError;

/// Port used when an address does not carry one
pub const DEFAULT_PORT: u16 = 25565;

/// A resolved `host:port` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

impl FromStr for ServerAddress {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || QueryError::InvalidAddress(s.to_string());

        if s.is_empty() || s.chars().any(char::is_whitespace) {
            return Err(invalid());
        }

        // [v6]:port or [v6]
        if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
            if host.is_empty() {
                return Err(invalid());
            }
            let port = match tail {
                "" => DEFAULT_PORT,
                tail => tail
                    .strip_prefix(':')
                    .and_then(|p| p.parse().ok())
                    .ok_or_else(invalid)?,
            };
            return Ok(Self {
                host: host.to_string(),
                port,
            });
        }

        match s.split_once(':') {
            None => Ok(Self {
                host: s.to_string(),
                port: DEFAULT_PORT,
            }),
            Some((host, port)) => {
                // a bare IPv6 address without brackets cannot carry a port
                if host.is_empty() || port.contains(':') {
                    return Err(invalid());
                }
                let port = port.parse::<u16>().map_err(|_| invalid())?;
                if port == 0 {
                    return Err(invalid());
                }
                Ok(Self {
                    host: host.to_string(),
                    port,
                })
            }
        }
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
