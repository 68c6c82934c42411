//! WebSocket upgrade handling for the relay
//!
//! The relay reads and answers the HTTP upgrade request itself so that it
//! can reply with a plain `400` or `401` before any WebSocket machinery is
//! involved. Only an accepted request is handed to tungstenite, together
//! with whatever bytes the client pipelined after the request head.
//!
//! Checks run in this order:
//!
//! 1. the request is a WebSocket upgrade (`GET`, `Upgrade: websocket`,
//!    `Sec-WebSocket-Key`), otherwise `400`;
//! 2. `Authorization` equals `Bearer <secret>`, otherwise `401`;
//! 3. the side-channel header holds a valid `host:port`, otherwise `400`.

use crate::credential::Credential;
use crate::error::UpgradeError;
use crate::helper::{MAX_REQUEST_HEADERS, MAX_REQUEST_HEAD_SIZE};
use crate::socks::TargetAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, warn};

/// Body sent when the request is not a WebSocket upgrade
pub const NOT_WEBSOCKET_BODY: &str = "This is a WebSocket server.";

/// Body sent when the secret does not match
pub const UNAUTHORIZED_BODY: &str = "secret is not matched";

/// Challenge sent along with a `401`
pub const WWW_AUTHENTICATE: &str = r#"Bearer realm="default", charset="UTF-8""#;

/// An HTTP error answer to an upgrade request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Response status
    pub status: StatusCode,
    /// Extra response headers
    pub headers: Vec<(&'static str, String)>,
    /// Plain text body
    pub body: String,
}

impl Rejection {
    /// `400` for anything that is not a WebSocket upgrade
    pub fn not_websocket() -> Self {
        Rejection {
            status: StatusCode::BAD_REQUEST,
            headers: Vec::new(),
            body: NOT_WEBSOCKET_BODY.to_string(),
        }
    }

    /// `401` with a bearer challenge
    pub fn unauthorized() -> Self {
        Rejection {
            status: StatusCode::UNAUTHORIZED,
            headers: vec![("WWW-Authenticate", WWW_AUTHENTICATE.to_string())],
            body: UNAUTHORIZED_BODY.to_string(),
        }
    }

    /// `400` for a missing or unusable target header
    pub fn bad_target(header: &str) -> Self {
        Rejection {
            status: StatusCode::BAD_REQUEST,
            headers: Vec::new(),
            body: format!("missing or invalid {} header", header),
        }
    }

    /// Serialize as an HTTP/1.1 response
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut response = format!(
            "HTTP/1.1 {} {}\r\n",
            self.status.as_u16(),
            self.status.canonical_reason().unwrap_or("")
        );
        for (name, value) in &self.headers {
            response.push_str(&format!("{}: {}\r\n", name, value));
        }
        response.push_str("Content-Type: text/plain; charset=utf-8\r\n");
        response.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        response.push_str("Connection: close\r\n\r\n");
        response.push_str(&self.body);
        response.into_bytes()
    }
}

/// A validated upgrade request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeRequest {
    /// Client `Sec-WebSocket-Key`
    pub key: String,
    /// Target named by the side-channel header
    pub target: TargetAddr,
}

/// Accepts WebSocket upgrades for the relay
#[derive(Debug, Clone)]
pub struct Acceptor {
    credential: Credential,
    host_header: String,
    handshake_timeout: Duration,
    max_head_size: usize,
}

impl Acceptor {
    /// Create an acceptor checking `credential` and reading the target from
    /// `host_header`
    pub fn new(credential: Credential, host_header: impl Into<String>) -> Self {
        Acceptor {
            credential,
            host_header: host_header.into(),
            handshake_timeout: Duration::from_secs(crate::helper::DEFAULT_HANDSHAKE_TIMEOUT_SECS),
            max_head_size: MAX_REQUEST_HEAD_SIZE,
        }
    }

    /// Set the deadline for the request head to arrive
    pub fn with_handshake_timeout(mut self, handshake_timeout: Duration) -> Self {
        self.handshake_timeout = handshake_timeout;
        self
    }

    /// Validate a complete request head
    pub fn inspect(&self, head: &[u8]) -> Result<UpgradeRequest, Rejection> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_REQUEST_HEADERS];
        let mut request = httparse::Request::new(&mut headers);

        match request.parse(head) {
            Ok(httparse::Status::Complete(_)) => {}
            Ok(httparse::Status::Partial) | Err(_) => return Err(Rejection::not_websocket()),
        }

        let header = |name: &str| {
            request
                .headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case(name))
                .map(|h| h.value)
        };

        let is_upgrade = request.method == Some("GET")
            && header("Upgrade")
                .map(|v| v.eq_ignore_ascii_case(b"websocket"))
                .unwrap_or(false);
        let key = header("Sec-WebSocket-Key")
            .and_then(|v| std::str::from_utf8(v).ok())
            .map(str::trim)
            .filter(|k| !k.is_empty());

        let key = match (is_upgrade, key) {
            (true, Some(key)) => key.to_string(),
            _ => return Err(Rejection::not_websocket()),
        };

        if !header("Authorization")
            .map(|v| self.credential.matches_authorization(v))
            .unwrap_or(false)
        {
            return Err(Rejection::unauthorized());
        }

        let target = header(&self.host_header)
            .and_then(|v| std::str::from_utf8(v).ok())
            .and_then(|v| v.parse::<TargetAddr>().ok())
            .ok_or_else(|| Rejection::bad_target(&self.host_header))?;

        Ok(UpgradeRequest { key, target })
    }

    /// Run the server side of the upgrade on `stream`
    ///
    /// On success the `101` response has been written and the returned
    /// WebSocket already holds any bytes received past the request head. A
    /// rejected request has been answered before the error is returned.
    pub async fn accept<S>(
        &self,
        mut stream: S,
    ) -> Result<(WebSocketStream<S>, TargetAddr), UpgradeError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let read = read_request_head(&mut stream, self.max_head_size);
        let (buf, head_len) = match timeout(self.handshake_timeout, read).await {
            Ok(Ok(head)) => head,
            Ok(Err(UpgradeError::HeadTooLarge(limit))) => {
                warn!("Request head exceeds {} bytes", limit);
                respond(&mut stream, &Rejection::not_websocket()).await;
                return Err(UpgradeError::HeadTooLarge(limit));
            }
            Ok(Err(UpgradeError::Malformed(e))) => {
                warn!("Malformed request head: {}", e);
                respond(&mut stream, &Rejection::not_websocket()).await;
                return Err(UpgradeError::Malformed(e));
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(UpgradeError::Timeout(self.handshake_timeout)),
        };

        let upgrade = match self.inspect(&buf[..head_len]) {
            Ok(upgrade) => upgrade,
            Err(rejection) => {
                warn!(
                    "Rejecting upgrade request: {} {}",
                    rejection.status.as_u16(),
                    rejection.body
                );
                respond(&mut stream, &rejection).await;
                return Err(UpgradeError::Rejected(rejection.status));
            }
        };

        stream
            .write_all(switching_protocols(&upgrade.key).as_bytes())
            .await?;
        stream.flush().await?;
        debug!("Upgrade accepted for {}", upgrade.target);

        let leftover = buf[head_len..].to_vec();
        let ws = WebSocketStream::from_partially_read(stream, leftover, Role::Server, None).await;

        Ok((ws, upgrade.target))
    }
}

/// Read until the end of an HTTP request head
///
/// Returns the buffer and the length of the head within it. Bytes past the
/// head belong to the WebSocket.
pub async fn read_request_head<S>(
    stream: &mut S,
    max_head_size: usize,
) -> Result<(Vec<u8>, usize), UpgradeError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(UpgradeError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed before the request head was complete",
            )));
        }
        buf.extend_from_slice(&chunk[..n]);

        let mut headers = [httparse::EMPTY_HEADER; MAX_REQUEST_HEADERS];
        match httparse::Request::new(&mut headers).parse(&buf)? {
            httparse::Status::Complete(head_len) if head_len > max_head_size => {
                return Err(UpgradeError::HeadTooLarge(max_head_size));
            }
            httparse::Status::Complete(head_len) => return Ok((buf, head_len)),
            httparse::Status::Partial if buf.len() >= max_head_size => {
                return Err(UpgradeError::HeadTooLarge(max_head_size));
            }
            httparse::Status::Partial => {}
        }
    }
}

/// The `101 Switching Protocols` response for a client key
pub fn switching_protocols(key: &str) -> String {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\r\n",
        derive_accept_key(key.as_bytes())
    )
}

/// Write a rejection; the connection is closed by the caller either way
async fn respond<S>(stream: &mut S, rejection: &Rejection)
where
    S: AsyncWrite + Unpin,
{
    if let Err(e) = stream.write_all(&rejection.to_bytes()).await {
        debug!("Failed to write rejection: {}", e);
        return;
    }
    if let Err(e) = stream.shutdown().await {
        debug!("Failed to shut down after rejection: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tokio::io::duplex;

    const KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";

    fn acceptor() -> Acceptor {
        Acceptor::new(Credential::new("secret"), "X-Host")
    }

    fn request(extra: &str) -> String {
        format!(
            "GET / HTTP/1.1\r\n\
             Host: relay\r\n\
             Connection: Upgrade\r\n\
             Upgrade: websocket\r\n\
             Sec-WebSocket-Version: 13\r\n\
             Sec-WebSocket-Key: {}\r\n\
             {}\r\n",
            KEY, extra
        )
    }

    #[test]
    fn test_inspect_accepts_valid_upgrade() {
        let head = request("Authorization: Bearer secret\r\nX-Host: 10.0.0.1:22\r\n");
        let upgrade = acceptor().inspect(head.as_bytes()).unwrap();
        assert_eq!(upgrade.key, KEY);
        assert_eq!(
            upgrade.target,
            TargetAddr::ipv4(Ipv4Addr::new(10, 0, 0, 1), 22)
        );
    }

    #[test]
    fn test_inspect_header_names_are_case_insensitive() {
        let head = request("authorization: Bearer secret\r\nx-host: example.com:443\r\n");
        let upgrade = acceptor().inspect(head.as_bytes()).unwrap();
        assert_eq!(upgrade.target, TargetAddr::domain("example.com", 443));
    }

    #[test]
    fn test_inspect_plain_request_is_not_websocket() {
        let head = "GET / HTTP/1.1\r\nHost: relay\r\nAuthorization: Bearer secret\r\n\r\n";
        let rejection = acceptor().inspect(head.as_bytes()).unwrap_err();
        assert_eq!(rejection, Rejection::not_websocket());
    }

    #[test]
    fn test_inspect_wrong_method_is_not_websocket() {
        let head = request("Authorization: Bearer secret\r\nX-Host: a:1\r\n").replacen("GET", "POST", 1);
        let rejection = acceptor().inspect(head.as_bytes()).unwrap_err();
        assert_eq!(rejection.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_inspect_garbage_is_not_websocket() {
        let rejection = acceptor().inspect(b"\x05\x01\x00\r\n\r\n").unwrap_err();
        assert_eq!(rejection, Rejection::not_websocket());
    }

    #[test]
    fn test_inspect_upgrade_checked_before_secret() {
        let head = "GET / HTTP/1.1\r\nHost: relay\r\n\r\n";
        let rejection = acceptor().inspect(head.as_bytes()).unwrap_err();
        assert_eq!(rejection.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_inspect_wrong_secret() {
        let head = request("Authorization: Bearer wrong\r\nX-Host: a:1\r\n");
        let rejection = acceptor().inspect(head.as_bytes()).unwrap_err();
        assert_eq!(rejection, Rejection::unauthorized());
    }

    #[test]
    fn test_inspect_missing_secret() {
        let head = request("X-Host: a:1\r\n");
        let rejection = acceptor().inspect(head.as_bytes()).unwrap_err();
        assert_eq!(rejection.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_inspect_missing_target() {
        let head = request("Authorization: Bearer secret\r\n");
        let rejection = acceptor().inspect(head.as_bytes()).unwrap_err();
        assert_eq!(rejection, Rejection::bad_target("X-Host"));
    }

    #[test]
    fn test_inspect_invalid_target() {
        for target in ["example.com", "example.com:99999", ":80", "[::1]:80"] {
            let head = request(&format!(
                "Authorization: Bearer secret\r\nX-Host: {}\r\n",
                target
            ));
            let rejection = acceptor().inspect(head.as_bytes()).unwrap_err();
            assert_eq!(rejection.status, StatusCode::BAD_REQUEST, "{}", target);
        }
    }

    #[test]
    fn test_inspect_custom_host_header() {
        let acceptor = Acceptor::new(Credential::new("secret"), "X-Target");
        let head = request("Authorization: Bearer secret\r\nX-Target: example.com:80\r\n");
        assert!(acceptor.inspect(head.as_bytes()).is_ok());

        let head = request("Authorization: Bearer secret\r\nX-Host: example.com:80\r\n");
        assert!(acceptor.inspect(head.as_bytes()).is_err());
    }

    #[test]
    fn test_rejection_to_bytes() {
        let response = String::from_utf8(Rejection::unauthorized().to_bytes()).unwrap();
        assert!(response.starts_with("HTTP/1.1 401 Unauthorized\r\n"));
        assert!(response.contains(
            "WWW-Authenticate: Bearer realm=\"default\", charset=\"UTF-8\"\r\n"
        ));
        assert!(response.contains("Content-Length: 21\r\n"));
        assert!(response.ends_with("\r\n\r\nsecret is not matched"));

        let response = String::from_utf8(Rejection::not_websocket().to_bytes()).unwrap();
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(response.ends_with("This is a WebSocket server."));
    }

    #[test]
    fn test_switching_protocols() {
        let response = switching_protocols(KEY);
        assert!(response.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        // RFC 6455 section 1.3 example
        assert!(response.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
        assert!(response.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_read_request_head_keeps_leftover() {
        let mut stream = tokio_test::io::Builder::new()
            .read(b"GET / HTTP/1.1\r\nHost: a\r\n")
            .read(b"\r\nextra")
            .build();

        let (buf, head_len) = read_request_head(&mut stream, 1024).await.unwrap();
        assert_eq!(&buf[..head_len], b"GET / HTTP/1.1\r\nHost: a\r\n\r\n");
        assert_eq!(&buf[head_len..], b"extra");
    }

    #[tokio::test]
    async fn test_read_request_head_too_large() {
        let mut stream = tokio_test::io::Builder::new()
            .read(&[b'a'; 64])
            .build();

        let result = read_request_head(&mut stream, 32).await;
        assert!(matches!(result, Err(UpgradeError::HeadTooLarge(32))));
    }

    #[tokio::test]
    async fn test_read_request_head_malformed() {
        let mut stream = tokio_test::io::Builder::new()
            .read(b"GET / HTTP/1.1\r\nBad Header\r\n\r\n")
            .build();

        let result = read_request_head(&mut stream, 1024).await;
        assert!(matches!(result, Err(UpgradeError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_accept_answers_malformed_head_with_400() {
        let (mut client, server) = duplex(4096);
        client
            .write_all(b"GET / HTTP/1.1\r\nBad Header\r\n\r\n")
            .await
            .unwrap();

        let result = acceptor().accept(server).await;
        assert!(matches!(result, Err(UpgradeError::Malformed(_))));

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 400"));
    }

    #[tokio::test]
    async fn test_read_request_head_eof() {
        let mut stream = tokio_test::io::Builder::new().read(b"GET / HT").build();
        let result = read_request_head(&mut stream, 1024).await;
        assert!(matches!(result, Err(UpgradeError::Io(_))));
    }

    #[tokio::test]
    async fn test_accept_writes_rejection() {
        let (mut client, server) = duplex(4096);
        let head = request("Authorization: Bearer wrong\r\nX-Host: a:1\r\n");
        client.write_all(head.as_bytes()).await.unwrap();

        let result = acceptor().accept(server).await;
        assert!(matches!(
            result,
            Err(UpgradeError::Rejected(StatusCode::UNAUTHORIZED))
        ));

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 401"));
    }

    #[tokio::test]
    async fn test_accept_times_out() {
        let (_client, server) = duplex(4096);
        let acceptor = acceptor().with_handshake_timeout(Duration::from_millis(50));

        let result = acceptor.accept(server).await;
        assert!(matches!(result, Err(UpgradeError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_accept_switches_protocols() {
        let (mut client, server) = duplex(4096);
        let head = request("Authorization: Bearer secret\r\nX-Host: example.com:80\r\n");
        client.write_all(head.as_bytes()).await.unwrap();

        let (_ws, target) = acceptor().accept(server).await.unwrap();
        assert_eq!(target, TargetAddr::domain("example.com", 80));

        let mut buf = vec![0u8; switching_protocols(KEY).len()];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), switching_protocols(KEY));
    }
}
