//! SOCKS5 method negotiation
//!
//! The frontend only serves unauthenticated local clients, so negotiation
//! always selects the no-authentication method.

use super::consts::*;
use crate::error::Socks5Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Perform the SOCKS5 greeting
///
/// Reads `VER NMETHODS METHODS...` and answers `[0x05, 0x00]` regardless of
/// the methods offered. A version other than 5 fails before anything is
/// written, so the caller can close the connection without a reply.
pub async fn negotiate<S>(stream: &mut S) -> Result<(), Socks5Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = [0u8; 2];
    stream.read_exact(&mut buf).await?;

    let version = buf[0];
    let num_methods = buf[1];

    if version != SOCKS5_VERSION {
        return Err(Socks5Error::UnsupportedVersion(version));
    }

    // Methods are read to keep the stream aligned; the answer does not
    // depend on them.
    let mut methods = vec![0u8; num_methods as usize];
    stream.read_exact(&mut methods).await?;

    stream
        .write_all(&[SOCKS5_VERSION, SOCKS5_AUTH_METHOD_NONE])
        .await?;
    stream.flush().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_negotiate_no_auth() {
        let mut stream = Builder::new()
            .read(&[SOCKS5_VERSION, 1, SOCKS5_AUTH_METHOD_NONE])
            .write(&[SOCKS5_VERSION, SOCKS5_AUTH_METHOD_NONE])
            .build();

        negotiate(&mut stream).await.unwrap();
    }

    #[tokio::test]
    async fn test_negotiate_ignores_offered_methods() {
        // Client only offers username/password; the reply is still no-auth
        let mut stream = Builder::new()
            .read(&[SOCKS5_VERSION, 2, 0x02, 0x01])
            .write(&[SOCKS5_VERSION, SOCKS5_AUTH_METHOD_NONE])
            .build();

        negotiate(&mut stream).await.unwrap();
    }

    #[tokio::test]
    async fn test_negotiate_rejects_socks4_without_reply() {
        // No write is scripted: any reply would fail the mock
        let mut stream = Builder::new().read(&[0x04, 1]).build();

        let result = negotiate(&mut stream).await;
        assert!(matches!(result, Err(Socks5Error::UnsupportedVersion(4))));
    }

    #[tokio::test]
    async fn test_negotiate_truncated_greeting() {
        let mut stream = Builder::new().read(&[SOCKS5_VERSION]).build();

        let result = negotiate(&mut stream).await;
        assert!(matches!(result, Err(Socks5Error::Io(_))));
    }
}
