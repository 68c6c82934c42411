//! Tunnel dialer
//!
//! Opens a transport session to the relay for one SOCKS5 CONNECT.

use crate::config::FrontendConfig;
use crate::credential::Credential;
use crate::error::DialError;
use crate::socks::TargetAddr;
use crate::transport::WsStream;
use async_trait::async_trait;
use futures::SinkExt;
use std::fmt::Debug;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderName, HeaderValue, AUTHORIZATION};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream};
use tracing::debug;
use url::Url;

/// Opens tunnel sessions to a relay
///
/// The returned stream must be *ready*: the relay accepted the session and
/// the next bytes written reach the target.
#[async_trait]
pub trait Dialer: Debug + Send + Sync + 'static {
    /// The stream type produced by this dialer
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Open a session carrying traffic for `target`
    async fn dial(&self, target: &TargetAddr) -> Result<Self::Stream, DialError>;
}

/// Dials the relay over WebSocket
///
/// The upgrade request carries `Authorization: Bearer <secret>` and the
/// target in the side-channel header. After the `101` an empty binary
/// message tells the relay to open the outbound connection.
#[derive(Debug, Clone)]
pub struct WsDialer {
    relay_url: Url,
    credential: Credential,
    host_header: HeaderName,
    handshake_timeout: Duration,
}

impl WsDialer {
    /// Create a dialer for `relay_url`
    pub fn new(
        relay_url: Url,
        credential: Credential,
        host_header: &str,
        handshake_timeout: Duration,
    ) -> Result<Self, DialError> {
        let host_header = HeaderName::from_bytes(host_header.as_bytes())
            .map_err(|e| DialError::InvalidRequest(e.to_string()))?;

        Ok(WsDialer {
            relay_url,
            credential,
            host_header,
            handshake_timeout,
        })
    }

    /// Create a dialer from the frontend configuration
    pub fn from_config(config: &FrontendConfig) -> Result<Self, DialError> {
        WsDialer::new(
            config.relay_url.clone(),
            config.secret.clone(),
            &config.host_header,
            config.handshake_timeout(),
        )
    }

    /// Relay URL
    pub fn relay_url(&self) -> &Url {
        &self.relay_url
    }

    /// Handshake timeout
    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    async fn open(&self, target: &TargetAddr) -> Result<WsStream<MaybeTlsStream<TcpStream>>, DialError> {
        let mut request = self
            .relay_url
            .as_str()
            .into_client_request()
            .map_err(|e| DialError::InvalidRequest(e.to_string()))?;

        let headers = request.headers_mut();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&self.credential.bearer())
                .map_err(|_| DialError::InvalidRequest("secret is not a valid header value".to_string()))?,
        );
        headers.insert(
            self.host_header.clone(),
            HeaderValue::from_str(&target.to_string())
                .map_err(|e| DialError::InvalidRequest(e.to_string()))?,
        );

        let (mut ws, response) = connect_async_with_config(request, None, true).await?;
        debug!("Relay answered {} for {}", response.status(), target);

        ws.send(Message::Binary(Vec::new())).await?;

        Ok(WsStream::new(ws))
    }
}

#[async_trait]
impl Dialer for WsDialer {
    type Stream = WsStream<MaybeTlsStream<TcpStream>>;

    async fn dial(&self, target: &TargetAddr) -> Result<Self::Stream, DialError> {
        timeout(self.handshake_timeout, self.open(target))
            .await
            .map_err(|_| DialError::Timeout(self.handshake_timeout))?
    }
}
