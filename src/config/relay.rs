//! Relay configuration types

use super::{validate_header_name, TcpConfig};
use crate::credential::Credential;
use crate::error::TunnelError;
use crate::helper::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_HANDSHAKE_TIMEOUT_SECS, DEFAULT_HOST_HEADER,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_handshake_timeout() -> u64 {
    DEFAULT_HANDSHAKE_TIMEOUT_SECS
}

fn default_host_header() -> String {
    DEFAULT_HOST_HEADER.to_string()
}

/// WebSocket relay configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RelayConfig {
    /// Listen address for upgrade requests
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Secret every upgrade must present
    pub secret: Credential,

    /// Outbound connect deadline in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Seconds allowed for the upgrade request head to arrive
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout: u64,

    /// Side-channel header carrying `host:port`
    #[serde(default = "default_host_header")]
    pub host_header: String,

    /// Options for outbound sockets
    #[serde(default)]
    pub tcp: TcpConfig,
}

impl RelayConfig {
    /// Create a configuration with defaults for everything but the secret
    pub fn new(secret: Credential) -> Self {
        RelayConfig {
            listen_addr: default_listen_addr(),
            secret,
            connect_timeout: default_connect_timeout(),
            handshake_timeout: default_handshake_timeout(),
            host_header: default_host_header(),
            tcp: TcpConfig::default(),
        }
    }

    /// Outbound connect deadline as a duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// Upgrade handshake deadline as a duration
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), TunnelError> {
        if self.secret.is_empty() {
            return Err(TunnelError::Config("secret must not be empty".to_string()));
        }
        if self.connect_timeout == 0 || self.handshake_timeout == 0 {
            return Err(TunnelError::Config(
                "timeouts must be at least 1 second".to_string(),
            ));
        }
        validate_header_name(&self.host_header)
    }
}
