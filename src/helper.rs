//! Helper utilities for socks2ws
//!
//! Shared defaults used by both sides of the tunnel.

/// Default outbound connection timeout in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default tunnel handshake timeout in seconds
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 10;

/// Default side-channel header carrying the target `host:port`
pub const DEFAULT_HOST_HEADER: &str = "X-Host";

/// Upper bound on an upgrade request head accepted by the relay
pub const MAX_REQUEST_HEAD_SIZE: usize = 8192;

/// Maximum number of headers parsed from an upgrade request
pub const MAX_REQUEST_HEADERS: usize = 64;
