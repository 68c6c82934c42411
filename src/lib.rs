//! # socks2ws - SOCKS5 over WebSocket
//!
//! socks2ws carries TCP connections from local SOCKS5 clients through a
//! WebSocket to a relay, which opens the real connection to the target.
//!
//! ## Components
//!
//! - **Frontend**: local SOCKS5 listener (no authentication, CONNECT to IPv4
//!   or domain targets). Each CONNECT gets its own WebSocket to the relay.
//! - **Relay**: accepts upgrades carrying `Authorization: Bearer <secret>`
//!   and an `X-Host: host:port` header, connects to the target after the
//!   first message and pipes bytes both ways.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use socks2ws::config::load_config;
//! use socks2ws::relay::run_relay;
//! use tokio::sync::broadcast;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config("config.toml")?;
//!     let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
//!
//!     let relay = config.relay.ok_or_else(|| anyhow::anyhow!("missing [relay] section"))?;
//!     run_relay(relay, shutdown_rx).await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! SOCKS5 Client -> Frontend -> WebSocket -> Relay -> Target
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod credential;
pub mod error;
pub mod frontend;
pub mod helper;
pub mod pipe;
pub mod relay;
pub mod socks;
pub mod transport;

// Re-export commonly used items
pub use config::{load_config, Config};
pub use credential::Credential;
pub use error::{DialError, Socks5Error, TunnelError, UpgradeError};
pub use frontend::{run_frontend, Frontend};
pub use relay::{run_relay, RelayServer};

/// Version of the socks2ws library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");
