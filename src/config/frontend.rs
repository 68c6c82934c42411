//! Frontend configuration types

use super::{validate_header_name, TcpConfig};
use crate::credential::Credential;
use crate::error::TunnelError;
use crate::helper::{DEFAULT_HANDSHAKE_TIMEOUT_SECS, DEFAULT_HOST_HEADER};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

fn default_listen_addr() -> String {
    "127.0.0.1:1080".to_string()
}

fn default_handshake_timeout() -> u64 {
    DEFAULT_HANDSHAKE_TIMEOUT_SECS
}

fn default_host_header() -> String {
    DEFAULT_HOST_HEADER.to_string()
}

/// SOCKS5 frontend configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FrontendConfig {
    /// Local SOCKS5 listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// WebSocket URL of the relay (`ws://` or `wss://`)
    pub relay_url: Url,

    /// Shared secret presented to the relay
    pub secret: Credential,

    /// Seconds to wait for a tunnel session to become ready
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout: u64,

    /// Side-channel header carrying `host:port`
    #[serde(default = "default_host_header")]
    pub host_header: String,

    /// Options for accepted client sockets
    #[serde(default)]
    pub tcp: TcpConfig,
}

impl FrontendConfig {
    /// Create a configuration with defaults for everything but the relay
    /// URL and the secret
    pub fn new(relay_url: Url, secret: Credential) -> Self {
        FrontendConfig {
            listen_addr: default_listen_addr(),
            relay_url,
            secret,
            handshake_timeout: default_handshake_timeout(),
            host_header: default_host_header(),
            tcp: TcpConfig::default(),
        }
    }

    /// Handshake timeout as a duration
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), TunnelError> {
        match self.relay_url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(TunnelError::Config(format!(
                    "relay_url must use ws:// or wss://, got {}://",
                    other
                )))
            }
        }
        if self.secret.is_empty() {
            return Err(TunnelError::Config("secret must not be empty".to_string()));
        }
        if self.handshake_timeout == 0 {
            return Err(TunnelError::Config(
                "handshake_timeout must be at least 1 second".to_string(),
            ));
        }
        validate_header_name(&self.host_header)
    }
}
