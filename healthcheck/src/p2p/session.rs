use super::codec::{Handshake, PeerCodec, PeerMessage};
use crate::classify;
use futures::{SinkExt, StreamExt};
use std::fmt;
use std::io;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};
use tokio_util::codec::Framed;
use tracing::debug;

#[derive(Debug)]
pub enum PeerError {
    /// Connect or a single read took longer than allowed
    Timeout,
    /// The session ceiling passed
    Deadline,
    /// The peer closed the connection
    Closed,
    Io(io::Error),
    Protocol(String),
}

impl PeerError {
    /// Short category for reports and alerts.
    pub fn category(&self) -> String {
        match self {
            PeerError::Timeout => classify::CONNECTION_TIMEOUT.to_string(),
            PeerError::Deadline => classify::TOO_SLOW.to_string(),
            PeerError::Closed => classify::TOO_MANY_PEERS.to_string(),
            PeerError::Io(e) => classify::normalize_io(e),
            PeerError::Protocol(reason) => reason.clone(),
        }
    }

    /// An abrupt close still proves something was listening.
    pub fn peer_answered(&self) -> bool {
        match self {
            PeerError::Closed => true,
            PeerError::Io(e) => e.kind() == io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
}

impl fmt::Display for PeerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerError::Timeout => write!(f, "timed out"),
            PeerError::Deadline => write!(f, "session deadline exceeded"),
            PeerError::Closed => write!(f, "connection closed by peer"),
            PeerError::Io(e) => write!(f, "{}", e),
            PeerError::Protocol(reason) => write!(f, "protocol error: {}", reason),
        }
    }
}

impl std::error::Error for PeerError {}

impl From<io::Error> for PeerError {
    fn from(err: io::Error) -> Self {
        PeerError::Io(err)
    }
}

/// An open, handshaken connection to a peer
pub struct PeerSession {
    framed: Framed<TcpStream, PeerCodec>,
    read_timeout: Duration,
}

impl PeerSession {
    pub async fn connect(
        addr: &str,
        handshake: &Handshake,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, PeerError> {
        let stream = timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| PeerError::Timeout)??;
        debug!("Connected to peer {}", addr);

        let mut framed = Framed::new(stream, PeerCodec::new());
        framed.send(handshake).await?;

        Ok(Self {
            framed,
            read_timeout,
        })
    }

    /// Waits for the next frame, bounded by both the per-read timeout and the
    /// session deadline.
    pub async fn next_message(&mut self, deadline: Instant) -> Result<PeerMessage, PeerError> {
        let read = timeout(self.read_timeout, self.framed.next());
        match timeout_at(deadline, read).await {
            Err(_) => Err(PeerError::Deadline),
            Ok(Err(_)) => Err(PeerError::Timeout),
            Ok(Ok(None)) => Err(PeerError::Closed),
            Ok(Ok(Some(message))) => message,
        }
    }

    pub async fn close(self) {
        let mut stream = self.framed.into_inner();
        if let Err(e) = stream.shutdown().await {
            debug!("Peer shutdown failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(PeerError::Deadline.category(), classify::TOO_SLOW);
        assert_eq!(PeerError::Timeout.category(), classify::CONNECTION_TIMEOUT);
        assert_eq!(PeerError::Closed.category(), classify::TOO_MANY_PEERS);

        let refused = PeerError::Io(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        assert_eq!(refused.category(), classify::CONNECTION_REFUSED);
        assert!(!refused.peer_answered());

        let eof = PeerError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        assert!(eof.peer_answered());
    }
}
