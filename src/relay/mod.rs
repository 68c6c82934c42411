//! WebSocket relay
//!
//! Accepts authenticated WebSocket upgrades, reads the target from the
//! side-channel header and splices the WebSocket with an outbound TCP
//! connection opened through a [`Connector`].

mod handshake;
mod session;

pub use handshake::{
    read_request_head, switching_protocols, Acceptor, Rejection, UpgradeRequest,
    NOT_WEBSOCKET_BODY, UNAUTHORIZED_BODY, WWW_AUTHENTICATE,
};
pub use session::{CloseKind, RelaySession, RelayState};

use crate::config::RelayConfig;
use crate::transport::{Connector, SocketOpts, TcpConnector};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, info, info_span, warn, Instrument};

/// Relay server
#[derive(Debug)]
pub struct RelayServer<C: Connector> {
    acceptor: Arc<Acceptor>,
    connector: Arc<C>,
}

impl RelayServer<TcpConnector> {
    /// Create a relay that connects out over TCP, as configured
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        config.validate()?;

        let acceptor = Acceptor::new(config.secret.clone(), config.host_header.clone())
            .with_handshake_timeout(config.handshake_timeout());
        let connector = TcpConnector::new(
            SocketOpts::from_tcp_config(&config.tcp),
            config.connect_timeout(),
        );

        Ok(RelayServer::new(acceptor, connector))
    }
}

impl<C: Connector> RelayServer<C> {
    /// Create a relay from its parts
    pub fn new(acceptor: Acceptor, connector: C) -> Self {
        RelayServer {
            acceptor: Arc::new(acceptor),
            connector: Arc::new(connector),
        }
    }

    /// Accept upgrade requests on `listener` until shutdown
    ///
    /// Each connection runs as its own task; a failing session never
    /// affects the others.
    pub async fn serve(
        &self,
        listener: TcpListener,
        mut shutdown_rx: broadcast::Receiver<bool>,
    ) -> Result<()> {
        let local_addr = listener
            .local_addr()
            .with_context(|| "Failed to get relay listen address")?;
        info!("Relay listening on {}", local_addr);

        let mut next_id: u64 = 0;
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!("Failed to accept connection: {}", e);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            continue;
                        }
                    };
                    next_id += 1;

                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("Failed to set TCP_NODELAY: {}", e);
                    }

                    let mut session = RelaySession::new(self.acceptor.clone(), self.connector.clone());
                    let span = info_span!("session", id = next_id, peer = %peer);
                    tokio::spawn(
                        async move {
                            debug!("Connection accepted");
                            if let Err(e) = session.run(stream).await {
                                warn!("Session ended with error: {:#}", e);
                            }
                        }
                        .instrument(span),
                    );
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping relay");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Bind the configured address and run the relay until shutdown
pub async fn run_relay(config: RelayConfig, shutdown_rx: broadcast::Receiver<bool>) -> Result<()> {
    let server = RelayServer::from_config(&config)?;
    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind relay listener on {}", config.listen_addr))?;

    server.serve(listener, shutdown_rx).await
}
