//! WebSocket byte stream
//!
//! [`WsStream`] implements `AsyncRead + AsyncWrite` over a message-framed
//! [`WebSocketStream`], so the tunnel pipe can treat the WebSocket like any
//! other socket:
//!
//! - every write becomes one binary message, without extra framing;
//! - binary and text messages are read back as raw bytes, ping/pong frames
//!   are skipped, and a close frame reads as end-of-stream;
//! - shutdown sends a close frame.

use bytes::Bytes;
use futures::{Sink, Stream};
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::WebSocketStream;

/// A WebSocket viewed as a byte stream
#[derive(Debug)]
pub struct WsStream<S> {
    inner: WebSocketStream<S>,
    /// Unread remainder of the last inbound message
    read_buf: Bytes,
    /// Set once a close frame (or the end of the stream) has been read
    eof: bool,
}

impl<S> WsStream<S> {
    /// Wrap an established WebSocket
    pub fn new(inner: WebSocketStream<S>) -> Self {
        WsStream {
            inner,
            read_buf: Bytes::new(),
            eof: false,
        }
    }
}

/// Map a WebSocket error onto the closest IO error
fn ws_to_io(err: WsError) -> io::Error {
    match err {
        WsError::Io(e) => e,
        WsError::ConnectionClosed | WsError::AlreadyClosed => {
            io::Error::new(io::ErrorKind::BrokenPipe, err)
        }
        WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => {
            io::Error::new(io::ErrorKind::ConnectionReset, err)
        }
        other => io::Error::new(io::ErrorKind::Other, other),
    }
}

impl<S> AsyncRead for WsStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        loop {
            if !this.read_buf.is_empty() {
                let to_copy = std::cmp::min(this.read_buf.len(), buf.remaining());
                buf.put_slice(&this.read_buf.split_to(to_copy));
                return Poll::Ready(Ok(()));
            }

            if this.eof {
                return Poll::Ready(Ok(()));
            }

            match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
                Some(Ok(Message::Binary(data))) => this.read_buf = Bytes::from(data),
                Some(Ok(Message::Text(text))) => this.read_buf = Bytes::from(text.into_bytes()),
                Some(Ok(Message::Close(_))) | None => this.eof = true,
                // Ping/pong are answered by tungstenite itself
                Some(Ok(_)) => {}
                Some(Err(WsError::ConnectionClosed)) => this.eof = true,
                Some(Err(e)) => return Poll::Ready(Err(ws_to_io(e))),
            }
        }
    }
}

impl<S> AsyncWrite for WsStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        let this = &mut *self;
        ready!(Pin::new(&mut this.inner).poll_ready(cx)).map_err(ws_to_io)?;
        Pin::new(&mut this.inner)
            .start_send(Message::Binary(buf.to_vec()))
            .map_err(ws_to_io)?;

        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx).map_err(ws_to_io)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match ready!(Pin::new(&mut self.inner).poll_close(cx)) {
            Ok(()) | Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => {
                Poll::Ready(Ok(()))
            }
            Err(e) => Poll::Ready(Err(ws_to_io(e))),
        }
    }
}
