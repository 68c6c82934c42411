//! SOCKS5 reply builder
//!
//! Constructs SOCKS5 reply messages. The bound address is never disclosed:
//! every reply carries `0.0.0.0:0`.

use crate::error::Socks5ReplyCode;
use crate::socks::consts::*;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Length of a reply with an IPv4 bound address
pub const REPLY_LEN: usize = 10;

/// Build the reply bytes for a status code
///
/// # SOCKS5 Reply Format
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
pub fn reply_bytes(reply_code: Socks5ReplyCode) -> [u8; REPLY_LEN] {
    [
        SOCKS5_VERSION,
        reply_code.into(),
        SOCKS5_RESERVED,
        SOCKS5_ADDR_TYPE_IPV4,
        0,
        0,
        0,
        0,
        0,
        0,
    ]
}

/// Build and send a SOCKS5 reply
pub async fn build_reply<S>(stream: &mut S, reply_code: Socks5ReplyCode) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(&reply_bytes(reply_code)).await?;
    stream.flush().await
}

/// Send the success reply
pub async fn send_success<S>(stream: &mut S) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    build_reply(stream, Socks5ReplyCode::Succeeded).await
}
