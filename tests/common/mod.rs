//! Test utilities and mocks for socks2ws
//!
//! This module provides common test utilities used across integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use socks2ws::credential::Credential;
use socks2ws::frontend::{Frontend, WsDialer};
use socks2ws::relay::{Acceptor, RelayServer};
use socks2ws::socks::TargetAddr;
use socks2ws::transport::{Connector, SocketOpts, TcpConnector};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use url::Url;

/// Secret shared by the test frontend and relay
pub const TEST_SECRET: &str = "test-secret";

/// Create a test TCP listener on an available port
pub async fn create_test_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Start a TCP echo server
pub async fn spawn_echo_server() -> SocketAddr {
    let (listener, addr) = create_test_listener().await;

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = stream.into_split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
                let _ = writer.shutdown().await;
            });
        }
    });

    addr
}

/// Echo one connection and return everything it received once it closes
pub async fn spawn_recording_echo_server() -> (SocketAddr, tokio::task::JoinHandle<Vec<u8>>) {
    let (listener, addr) = create_test_listener().await;

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    received.extend_from_slice(&buf[..n]);
                    if stream.write_all(&buf[..n]).await.is_err() {
                        break;
                    }
                }
            }
        }
        received
    });

    (addr, handle)
}

/// An address nothing listens on
pub async fn closed_port() -> SocketAddr {
    let (listener, addr) = create_test_listener().await;
    drop(listener);
    addr
}

/// TCP connector that counts connect attempts
#[derive(Debug, Clone)]
pub struct CountingConnector {
    inner: TcpConnector,
    attempts: Arc<AtomicUsize>,
}

impl CountingConnector {
    /// Wrap a default TCP connector
    pub fn new() -> Self {
        CountingConnector {
            inner: TcpConnector::with_defaults().with_connect_timeout(Duration::from_secs(2)),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared attempt counter
    pub fn attempts(&self) -> Arc<AtomicUsize> {
        self.attempts.clone()
    }
}

#[async_trait]
impl Connector for CountingConnector {
    type Stream = TcpStream;

    async fn connect(&self, target: &TargetAddr) -> anyhow::Result<TcpStream> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.inner.connect(target).await
    }
}

/// A running relay
pub struct TestRelay {
    /// Relay listen address
    pub addr: SocketAddr,
    /// Outbound connect attempts
    pub connects: Arc<AtomicUsize>,
    shutdown_tx: broadcast::Sender<bool>,
}

impl TestRelay {
    /// Number of outbound connects attempted so far
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// WebSocket URL of the relay
    pub fn url(&self) -> Url {
        Url::parse(&format!("ws://{}/", self.addr)).unwrap()
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Start a relay with a counting connector
pub async fn start_relay(secret: &str) -> TestRelay {
    let connector = CountingConnector::new();
    let connects = connector.attempts();
    let acceptor = Acceptor::new(Credential::new(secret), "X-Host")
        .with_handshake_timeout(Duration::from_secs(2));
    let server = RelayServer::new(acceptor, connector);

    let (listener, addr) = create_test_listener().await;
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move { server.serve(listener, shutdown_rx).await });

    TestRelay {
        addr,
        connects,
        shutdown_tx,
    }
}

/// A running frontend
pub struct TestFrontend {
    /// SOCKS5 listen address
    pub addr: SocketAddr,
    shutdown_tx: broadcast::Sender<bool>,
}

impl Drop for TestFrontend {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Start a frontend dialing `relay_url`
pub async fn start_frontend(relay_url: Url, secret: &str) -> TestFrontend {
    let dialer = WsDialer::new(
        relay_url,
        Credential::new(secret),
        "X-Host",
        Duration::from_secs(2),
    )
    .unwrap();
    let frontend = Frontend::new(dialer, SocketOpts::default());

    let (listener, addr) = create_test_listener().await;
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move { frontend.serve(listener, shutdown_rx).await });

    TestFrontend { addr, shutdown_tx }
}

/// Start a relay and a frontend sharing the test secret
pub async fn start_tunnel() -> (TestFrontend, TestRelay) {
    let relay = start_relay(TEST_SECRET).await;
    let frontend = start_frontend(relay.url(), TEST_SECRET).await;
    (frontend, relay)
}

/// Connect to the frontend and complete the SOCKS5 greeting
pub async fn socks5_greet(frontend: SocketAddr) -> TcpStream {
    let mut stream = TcpStream::connect(frontend).await.unwrap();
    stream
        .write_all(&socks5_mock::create_auth_request_no_auth())
        .await
        .unwrap();
    let mut reply = [0u8; 2];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, [0x05, 0x00]);
    stream
}

/// Read until EOF with a deadline; returns everything read
pub async fn read_until_closed(stream: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf))
        .await
        .expect("peer did not close")
        .unwrap_or_default();
    buf
}

/// Mock SOCKS5 handshake data
pub mod socks5_mock {
    use socks2ws::socks::*;

    /// Create a no-auth method selection request
    pub fn create_auth_request_no_auth() -> Vec<u8> {
        vec![SOCKS5_VERSION, 1, SOCKS5_AUTH_METHOD_NONE]
    }

    /// Create a connect command to IPv4 address
    pub fn create_connect_ipv4(ip: [u8; 4], port: u16) -> Vec<u8> {
        let mut cmd = vec![
            SOCKS5_VERSION,
            SOCKS5_CMD_TCP_CONNECT,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_IPV4,
        ];
        cmd.extend_from_slice(&ip);
        cmd.extend_from_slice(&port.to_be_bytes());
        cmd
    }

    /// Create a connect command to domain
    pub fn create_connect_domain(domain: &str, port: u16) -> Vec<u8> {
        let mut cmd = vec![
            SOCKS5_VERSION,
            SOCKS5_CMD_TCP_CONNECT,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_DOMAIN,
            domain.len() as u8,
        ];
        cmd.extend_from_slice(domain.as_bytes());
        cmd.extend_from_slice(&port.to_be_bytes());
        cmd
    }

    /// Create a request with an arbitrary command byte to an IPv4 address
    pub fn create_command_ipv4(command: u8, ip: [u8; 4], port: u16) -> Vec<u8> {
        let mut cmd = create_connect_ipv4(ip, port);
        cmd[1] = command;
        cmd
    }
}
