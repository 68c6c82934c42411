//! SOCKS5 type definitions
//!
//! Defines the request and address types carried from the SOCKS5 client,
//! through the side-channel header, to the relay.

use super::consts::*;
use crate::error::TunnelError;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// SOCKS5 command types
///
/// CONNECT is the only command the tunnel carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocksCommand {
    /// TCP CONNECT - establish a TCP connection to target
    Connect,
}

impl SocksCommand {
    /// Parse a command byte into SocksCommand
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            SOCKS5_CMD_TCP_CONNECT => Some(SocksCommand::Connect),
            _ => None,
        }
    }
}

impl fmt::Display for SocksCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocksCommand::Connect => write!(f, "CONNECT"),
        }
    }
}

/// Target address of a tunnel
///
/// Parsed from a SOCKS5 request on the frontend, sent to the relay as
/// `host:port` in the side-channel header, and parsed back there.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetAddr {
    /// IPv4 address with port
    Ipv4(Ipv4Addr, u16),
    /// Domain name with port
    Domain(String, u16),
}

impl TargetAddr {
    /// Create a new TargetAddr from an IPv4 address and port
    pub fn ipv4(ip: Ipv4Addr, port: u16) -> Self {
        TargetAddr::Ipv4(ip, port)
    }

    /// Create a new TargetAddr from a domain name and port
    pub fn domain(domain: impl Into<String>, port: u16) -> Self {
        TargetAddr::Domain(domain.into(), port)
    }

    /// Host part, as it appears in `host:port`
    pub fn host(&self) -> String {
        match self {
            TargetAddr::Ipv4(ip, _) => ip.to_string(),
            TargetAddr::Domain(domain, _) => domain.clone(),
        }
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        match self {
            TargetAddr::Ipv4(_, port) | TargetAddr::Domain(_, port) => *port,
        }
    }
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetAddr::Ipv4(ip, port) => write!(f, "{}:{}", ip, port),
            TargetAddr::Domain(domain, port) => write!(f, "{}:{}", domain, port),
        }
    }
}

impl FromStr for TargetAddr {
    type Err = TunnelError;

    /// Parse the `host:port` form used by the side-channel header
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TunnelError::InvalidTarget(s.to_string());

        let (host, port) = s.trim().rsplit_once(':').ok_or_else(invalid)?;
        let port: u16 = port.parse().map_err(|_| invalid())?;

        // IPv6 literals are not carried by the tunnel
        if host.is_empty() || host.len() > MAX_DOMAIN_LEN || host.contains(':') {
            return Err(invalid());
        }

        match host.parse::<Ipv4Addr>() {
            Ok(ip) => Ok(TargetAddr::Ipv4(ip, port)),
            Err(_) => Ok(TargetAddr::Domain(host.to_string(), port)),
        }
    }
}

/// A parsed SOCKS5 request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocksRequest {
    /// Requested command
    pub command: SocksCommand,
    /// Destination of the request
    pub target: TargetAddr,
}
