//! Bidirectional pipe
//!
//! Splices two byte-stream endpoints together. The pipe knows nothing about
//! the protocols on either side: a TCP socket, a SOCKS5 client connection
//! and a [`WsStream`](crate::transport::WsStream) all look the same to it.
//!
//! The first direction to finish ends the whole session:
//!
//! - on end-of-stream both write sides are shut down gracefully, so a TCP
//!   peer sees FIN and a WebSocket peer sees a close frame;
//! - on error both endpoints are dropped without a graceful shutdown, so
//!   the surviving peer observes an abortive close.

use std::fmt;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Direction of a copy within the pipe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From the first endpoint to the second
    AToB,
    /// From the second endpoint to the first
    BToA,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::AToB => write!(f, "A->B"),
            Direction::BToA => write!(f, "B->A"),
        }
    }
}

/// How a pipe ended normally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipeSummary {
    /// The direction whose source reached end-of-stream first
    pub closed_by: Direction,
    /// Bytes copied in that direction
    pub bytes: u64,
}

/// A read or write failure inside the pipe
#[derive(Error, Debug)]
#[error("{direction} copy failed: {source}")]
pub struct PipeError {
    /// The direction that failed
    pub direction: Direction,
    /// Underlying IO error
    #[source]
    pub source: io::Error,
}

/// Relay data bidirectionally between two streams
///
/// Copies in both directions concurrently and returns as soon as either
/// direction reaches end-of-stream or fails. Each copy awaits its write
/// before reading again, so the pipe never reads faster than the other side
/// accepts.
pub async fn pipe<A, B>(a: A, b: B) -> Result<PipeSummary, PipeError>
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut a_read, mut a_write) = tokio::io::split(a);
    let (mut b_read, mut b_write) = tokio::io::split(b);

    let (direction, result) = {
        let a_to_b = tokio::io::copy(&mut a_read, &mut b_write);
        let b_to_a = tokio::io::copy(&mut b_read, &mut a_write);

        tokio::select! {
            result = a_to_b => (Direction::AToB, result),
            result = b_to_a => (Direction::BToA, result),
        }
    };

    match result {
        Ok(bytes) => {
            debug!("{} finished: {} bytes", direction, bytes);

            // Graceful close of both endpoints; either may already be gone
            if let Err(e) = b_write.shutdown().await {
                debug!("Failed to shut down B writer: {}", e);
            }
            if let Err(e) = a_write.shutdown().await {
                debug!("Failed to shut down A writer: {}", e);
            }

            Ok(PipeSummary {
                closed_by: direction,
                bytes,
            })
        }
        Err(source) => {
            debug!("{} error: {}", direction, source);
            Err(PipeError { direction, source })
        }
    }
}
