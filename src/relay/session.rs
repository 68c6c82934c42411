//! Per-connection relay session
//!
//! ```text
//! Idle -> AwaitingFirstSignal -> Connecting -> Relaying -> Closed
//! ```
//!
//! The outbound connection is opened only after the first data message
//! arrives on the WebSocket. That message only signals readiness; its
//! payload is discarded.

use super::handshake::Acceptor;
use crate::error::UpgradeError;
use crate::pipe::pipe;
use crate::transport::{Connector, WsStream};
use anyhow::{Context, Result};
use futures::StreamExt;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

/// How a relay session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseKind {
    /// Peer closed or the pipe reached end-of-stream
    Normal,
    /// A handshake, connect or relay failure
    Error,
}

/// Relay session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Reading the upgrade request
    Idle,
    /// Upgraded; waiting for the first data message
    AwaitingFirstSignal,
    /// Opening the outbound connection
    Connecting,
    /// Piping bytes between the WebSocket and the target
    Relaying,
    /// Finished
    Closed(CloseKind),
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayState::Idle => write!(f, "idle"),
            RelayState::AwaitingFirstSignal => write!(f, "awaiting-first-signal"),
            RelayState::Connecting => write!(f, "connecting"),
            RelayState::Relaying => write!(f, "relaying"),
            RelayState::Closed(CloseKind::Normal) => write!(f, "closed"),
            RelayState::Closed(CloseKind::Error) => write!(f, "closed-with-error"),
        }
    }
}

/// One accepted connection on the relay
pub struct RelaySession<C: Connector> {
    acceptor: Arc<Acceptor>,
    connector: Arc<C>,
    state: RelayState,
}

impl<C: Connector> RelaySession<C> {
    /// Create a session in the `Idle` state
    pub fn new(acceptor: Arc<Acceptor>, connector: Arc<C>) -> Self {
        RelaySession {
            acceptor,
            connector,
            state: RelayState::Idle,
        }
    }

    /// Current state
    pub fn state(&self) -> RelayState {
        self.state
    }

    fn transition(&mut self, next: RelayState) {
        debug!("{} -> {}", self.state, next);
        self.state = next;
    }

    /// Drive the session to completion on an accepted connection
    pub async fn run<S>(&mut self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let result = self.drive(stream).await;
        let kind = if result.is_ok() {
            CloseKind::Normal
        } else {
            CloseKind::Error
        };
        self.transition(RelayState::Closed(kind));
        result
    }

    async fn drive<S>(&mut self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let (mut ws, target) = match self.acceptor.accept(stream).await {
            Ok(accepted) => accepted,
            Err(UpgradeError::Rejected(status)) => {
                debug!("Upgrade answered with {}", status);
                return Ok(());
            }
            Err(e) => return Err(e).context("Upgrade handshake failed"),
        };

        self.transition(RelayState::AwaitingFirstSignal);
        if !wait_for_signal(&mut ws)
            .await
            .context("WebSocket failed before the first message")?
        {
            debug!("WebSocket closed before the first message, not connecting");
            return Ok(());
        }

        self.transition(RelayState::Connecting);
        let outbound = match self.connector.connect(&target).await {
            Ok(outbound) => outbound,
            Err(e) => {
                warn!("Failed to connect to {}: {:#}", target, e);
                let frame = CloseFrame {
                    code: CloseCode::Error,
                    reason: Cow::Borrowed("connect failed"),
                };
                if let Err(close_err) = ws.close(Some(frame)).await {
                    debug!("Failed to close WebSocket: {}", close_err);
                }
                return Err(e.context(format!("Failed to connect to {}", target)));
            }
        };

        info!("Relaying to {}", target);
        self.transition(RelayState::Relaying);
        let summary = pipe(WsStream::new(ws), outbound)
            .await
            .with_context(|| format!("Relay to {} failed", target))?;
        debug!(
            "Relay to {} finished, {} closed after {} bytes",
            target, summary.closed_by, summary.bytes
        );

        Ok(())
    }
}

/// Wait for the first binary or text message
///
/// Returns `false` if the peer closed first. Control frames are skipped.
async fn wait_for_signal<S>(ws: &mut WebSocketStream<S>) -> Result<bool, WsError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(message) = ws.next().await {
        match message {
            Ok(Message::Binary(_)) | Ok(Message::Text(_)) => return Ok(true),
            Ok(Message::Close(_)) => return Ok(false),
            Ok(_) => continue,
            Err(WsError::ConnectionClosed) => return Ok(false),
            Err(e) => return Err(e),
        }
    }
    Ok(false)
}
