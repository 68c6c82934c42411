//! TCP connector implementation
//!
//! Opens the relay's outbound connections with a bounded connect deadline.

use super::{Connector, SocketOpts};
use crate::error::TunnelError;
use crate::socks::TargetAddr;
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;

/// Plain TCP connector for outbound target connections
#[derive(Debug, Clone)]
pub struct TcpConnector {
    /// Socket options to apply to connections
    socket_opts: SocketOpts,
    /// Connection timeout
    connect_timeout: Duration,
}

impl TcpConnector {
    /// Create a new TCP connector
    pub fn new(socket_opts: SocketOpts, connect_timeout: Duration) -> Self {
        TcpConnector {
            socket_opts,
            connect_timeout,
        }
    }

    /// Create a new TCP connector with default options
    pub fn with_defaults() -> Self {
        TcpConnector::new(
            SocketOpts::default(),
            Duration::from_secs(crate::helper::DEFAULT_CONNECT_TIMEOUT_SECS),
        )
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Get the connection timeout
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, target: &TargetAddr) -> Result<Self::Stream> {
        let host = target.host();
        let connect = TcpStream::connect((host.as_str(), target.port()));

        let stream = match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(TunnelError::Connect {
                    target: target.to_string(),
                    source,
                }
                .into())
            }
            Err(_) => {
                return Err(TunnelError::Timeout(format!(
                    "connect to {} exceeded {:?}",
                    target, self.connect_timeout
                ))
                .into())
            }
        };

        if let Err(e) = self.socket_opts.apply(&stream) {
            tracing::warn!("Failed to apply socket options: {}", e);
        }

        tracing::debug!("TCP connection established to {}", target);

        Ok(stream)
    }
}
