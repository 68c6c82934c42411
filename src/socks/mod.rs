//! SOCKS5 module for socks2ws
//!
//! Implements the SOCKS5 subset spoken by the local frontend: no-auth
//! method negotiation, CONNECT requests to IPv4 or domain targets, and
//! replies with a zeroed bound address.

mod command;
mod consts;
mod greeting;
mod types;

pub use command::{build_reply, parse_command, reply_bytes, send_success, REPLY_LEN};
pub use consts::*;
pub use greeting::negotiate;
pub use types::{SocksCommand, SocksRequest, TargetAddr};
