//! SOCKS5 frontend
//!
//! Serves local SOCKS5 clients and carries each CONNECT through its own
//! tunnel session to the relay.

mod dialer;
mod session;

pub use dialer::{Dialer, WsDialer};
pub use session::{FrontendSession, FrontendState};

use crate::config::FrontendConfig;
use crate::transport::SocketOpts;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, info, info_span, warn, Instrument};

/// SOCKS5 frontend server
#[derive(Debug)]
pub struct Frontend<D: Dialer> {
    dialer: Arc<D>,
    socket_opts: SocketOpts,
}

impl Frontend<WsDialer> {
    /// Create a frontend that dials the configured relay
    pub fn from_config(config: &FrontendConfig) -> Result<Self> {
        config.validate()?;
        let dialer = WsDialer::from_config(config)?;

        Ok(Frontend::new(dialer, SocketOpts::from_tcp_config(&config.tcp)))
    }
}

impl<D: Dialer> Frontend<D> {
    /// Create a frontend from a dialer
    pub fn new(dialer: D, socket_opts: SocketOpts) -> Self {
        Frontend {
            dialer: Arc::new(dialer),
            socket_opts,
        }
    }

    /// Get a reference to the dialer
    pub fn dialer(&self) -> &Arc<D> {
        &self.dialer
    }

    /// Accept SOCKS5 clients on `listener` until shutdown
    pub async fn serve(
        &self,
        listener: TcpListener,
        mut shutdown_rx: broadcast::Receiver<bool>,
    ) -> Result<()> {
        let local_addr = listener
            .local_addr()
            .with_context(|| "Failed to get frontend listen address")?;
        info!("SOCKS5 frontend listening on {}", local_addr);

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

                    if let Err(e) = self.socket_opts.apply(&stream) {
                        debug!("Failed to apply socket options: {}", e);
                    }

                    let mut session = FrontendSession::new(self.dialer.clone());
                    let span = info_span!("session", id = next_id, peer = %peer);
                    tokio::spawn(
                        async move {
                            debug!("Client connected");
                            if let Err(e) = session.run(stream).await {
                                warn!("Session ended with error: {:#}", e);
                            }
                        }
                        .instrument(span),
                    );
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping frontend");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Bind the configured address and run the frontend until shutdown
pub async fn run_frontend(
    config: FrontendConfig,
    shutdown_rx: broadcast::Receiver<bool>,
) -> Result<()> {
    let frontend = Frontend::from_config(&config)?;
    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind SOCKS5 listener on {}", config.listen_addr))?;

    info!("Relay: {}", config.relay_url);
    frontend.serve(listener, shutdown_rx).await
}
