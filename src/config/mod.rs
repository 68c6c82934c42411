//! Configuration module for socks2ws
//!
//! This module provides configuration types and parsing for the frontend
//! and the relay.

mod frontend;
mod relay;
mod transport;

pub use frontend::FrontendConfig;
pub use relay::RelayConfig;
pub use transport::TcpConfig;

use crate::error::TunnelError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio_tungstenite::tungstenite::http::HeaderName;

/// Root configuration structure
///
/// A single file may configure either side or both.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// SOCKS5 frontend configuration
    #[serde(default)]
    pub frontend: Option<FrontendConfig>,

    /// WebSocket relay configuration
    #[serde(default)]
    pub relay: Option<RelayConfig>,
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

    parse_config(&content)
}

/// Parse configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse configuration")
}

/// Check that a configured header name is a valid HTTP header name
fn validate_header_name(name: &str) -> Result<(), TunnelError> {
    HeaderName::from_bytes(name.as_bytes())
        .map(|_| ())
        .map_err(|_| TunnelError::Config(format!("invalid header name: {:?}", name)))
}
