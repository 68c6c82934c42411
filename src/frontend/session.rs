//! Per-client SOCKS5 session
//!
//! ```text
//! AwaitingGreeting -> AwaitingRequest -> Connecting -> Relaying -> Closed
//! ```
//!
//! Protocol violations close the connection without a reply. A tunnel that
//! cannot be opened is reported with a SOCKS5 failure reply first.

use super::dialer::Dialer;
use crate::error::Socks5ReplyCode;
use crate::pipe::pipe;
use crate::socks::{build_reply, negotiate, parse_command, send_success};
use anyhow::{Context, Result};
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

/// Frontend session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontendState {
    /// Waiting for the method negotiation
    AwaitingGreeting,
    /// Waiting for the CONNECT request
    AwaitingRequest,
    /// Opening the tunnel session
    Connecting,
    /// Piping bytes between the client and the tunnel
    Relaying,
    /// Finished
    Closed,
}

impl fmt::Display for FrontendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrontendState::AwaitingGreeting => "awaiting-greeting",
            FrontendState::AwaitingRequest => "awaiting-request",
            FrontendState::Connecting => "connecting",
            FrontendState::Relaying => "relaying",
            FrontendState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// One SOCKS5 client connection
pub struct FrontendSession<D: Dialer> {
    dialer: Arc<D>,
    state: FrontendState,
}

impl<D: Dialer> FrontendSession<D> {
    /// Create a session in the `AwaitingGreeting` state
    pub fn new(dialer: Arc<D>) -> Self {
        FrontendSession {
            dialer,
            state: FrontendState::AwaitingGreeting,
        }
    }

    /// Current state
    pub fn state(&self) -> FrontendState {
        self.state
    }

    fn transition(&mut self, next: FrontendState) {
        debug!("{} -> {}", self.state, next);
        self.state = next;
    }

    /// Serve one client until either side closes
    pub async fn run<S>(&mut self, mut stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let result = self.drive(&mut stream).await;
        self.transition(FrontendState::Closed);
        result
    }

    async fn drive<S>(&mut self, stream: &mut S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        negotiate(stream)
            .await
            .with_context(|| "SOCKS5 negotiation failed")?;

        self.transition(FrontendState::AwaitingRequest);
        let request = parse_command(stream)
            .await
            .with_context(|| "Failed to parse SOCKS5 request")?;
        info!("SOCKS5 {} request to {}", request.command, request.target);

        self.transition(FrontendState::Connecting);
        let tunnel = match self.dialer.dial(&request.target).await {
            Ok(tunnel) => tunnel,
            Err(e) => {
                let code = Socks5ReplyCode::from(&e);
                warn!("Tunnel to {} failed: {}", request.target, e);
                if let Err(reply_err) = build_reply(stream, code).await {
                    debug!("Failed to send failure reply: {}", reply_err);
                }
                return Err(e).with_context(|| format!("Failed to open tunnel to {}", request.target));
            }
        };

        send_success(stream)
            .await
            .with_context(|| "Failed to send SOCKS5 reply")?;

        self.transition(FrontendState::Relaying);
        let summary = pipe(stream, tunnel)
            .await
            .with_context(|| format!("Tunnel to {} failed", request.target))?;
        debug!(
            "Tunnel to {} finished, {} closed after {} bytes",
            request.target, summary.closed_by, summary.bytes
        );

        Ok(())
    }
}
