//! Error types for socks2ws
//!
//! This module defines the custom error types shared by the SOCKS5 frontend
//! and the WebSocket relay.

use std::io;
use thiserror::Error;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::http::StatusCode;

/// Main error type for socks2ws operations
#[derive(Error, Debug)]
pub enum TunnelError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A `host:port` string that cannot name a tunnel target
    #[error("Invalid target address: {0}")]
    InvalidTarget(String),

    /// Outbound connection to the target failed
    #[error("Failed to connect to {target}: {source}")]
    Connect {
        /// Target that was being connected to
        target: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),
}

/// SOCKS5 protocol violations seen on the client connection
///
/// Every variant is terminal: the frontend closes the client connection
/// without sending a reply.
#[derive(Error, Debug)]
pub enum Socks5Error {
    /// Unsupported SOCKS version
    #[error("Unsupported SOCKS version: {0}")]
    UnsupportedVersion(u8),

    /// Command not supported
    #[error("Command not supported: {0}")]
    CommandNotSupported(u8),

    /// Address type not supported
    #[error("Address type not supported: {0}")]
    AddressTypeNotSupported(u8),

    /// Invalid domain name
    #[error("Invalid domain name: {0}")]
    InvalidDomain(String),

    /// The client hung up or the socket failed mid-negotiation
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised while opening a transport session to the relay
#[derive(Error, Debug)]
pub enum DialError {
    /// The session did not become ready within the handshake timeout
    #[error("Relay did not become ready within {0:?}")]
    Timeout(std::time::Duration),

    /// The relay answered the upgrade with a non-101 status
    #[error("Relay rejected the upgrade with status {0}")]
    Rejected(StatusCode),

    /// WebSocket handshake or signalling failure
    #[error("WebSocket handshake failed: {0}")]
    Handshake(#[source] tungstenite::Error),

    /// Building the upgrade request failed
    #[error("Invalid upgrade request: {0}")]
    InvalidRequest(String),
}

impl From<tungstenite::Error> for DialError {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::Http(response) => DialError::Rejected(response.status()),
            other => DialError::Handshake(other),
        }
    }
}

/// Errors raised while the relay accepts an upgrade request
#[derive(Error, Debug)]
pub enum UpgradeError {
    /// The connection failed or closed before a full request head arrived
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The request head is not valid HTTP
    #[error("Malformed request head: {0}")]
    Malformed(#[from] httparse::Error),

    /// The request head did not fit the read limit
    #[error("Request head exceeds {0} bytes")]
    HeadTooLarge(usize),

    /// The request head did not arrive in time
    #[error("Request head not received within {0:?}")]
    Timeout(std::time::Duration),

    /// The request was answered with an HTTP error status
    #[error("Upgrade rejected with status {0}")]
    Rejected(StatusCode),
}

/// Reply codes for SOCKS5 protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Socks5ReplyCode {
    /// Command succeeded
    Succeeded = 0x00,
    /// General SOCKS server failure
    GeneralFailure = 0x01,
    /// Connection not allowed by ruleset
    ConnectionNotAllowed = 0x02,
    /// Network unreachable
    NetworkUnreachable = 0x03,
    /// Host unreachable
    HostUnreachable = 0x04,
    /// Connection refused
    ConnectionRefused = 0x05,
    /// TTL expired
    TtlExpired = 0x06,
    /// Command not supported
    CommandNotSupported = 0x07,
    /// Address type not supported
    AddressTypeNotSupported = 0x08,
}

impl From<Socks5ReplyCode> for u8 {
    fn from(code: Socks5ReplyCode) -> Self {
        code as u8
    }
}

impl From<&DialError> for Socks5ReplyCode {
    fn from(err: &DialError) -> Self {
        match err {
            DialError::Timeout(_) => Socks5ReplyCode::HostUnreachable,
            DialError::Rejected(status)
                if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN =>
            {
                Socks5ReplyCode::ConnectionNotAllowed
            }
            DialError::Handshake(tungstenite::Error::Io(e)) => match e.kind() {
                io::ErrorKind::ConnectionRefused => Socks5ReplyCode::ConnectionRefused,
                io::ErrorKind::TimedOut => Socks5ReplyCode::HostUnreachable,
                _ => Socks5ReplyCode::GeneralFailure,
            },
            _ => Socks5ReplyCode::GeneralFailure,
        }
    }
}
