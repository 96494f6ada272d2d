//! Write side of a client connection

use crate::error::{HubError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::SinkExt;
use std::net::SocketAddr;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{mpsc, Mutex};
use tokio_util::codec::{FramedWrite, LengthDelimitedCodec};
use tokio_util::sync::CancellationToken;

/// Something the hub can push encoded frames into
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Deliver one JSON frame. An error means the connection is dead.
    async fn send_frame(&self, frame: &str) -> Result<()>;

    /// Cancelled once the hub has given up on this connection
    fn closed(&self) -> &CancellationToken;

    /// Ask the owning receive loop to stop
    fn close(&self) {
        self.closed().cancel();
    }

    fn is_closed(&self) -> bool {
        self.closed().is_cancelled()
    }
}

/// Length-delimited TCP connection
pub struct TcpConnection {
    peer: SocketAddr,
    writer: Mutex<FramedWrite<OwnedWriteHalf, LengthDelimitedCodec>>,
    closed: CancellationToken,
}

impl TcpConnection {
    pub fn new(peer: SocketAddr, writer: OwnedWriteHalf) -> Self {
        Self {
            peer,
            writer: Mutex::new(FramedWrite::new(writer, LengthDelimitedCodec::new())),
            closed: CancellationToken::new(),
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

#[async_trait]
impl Outbound for TcpConnection {
    async fn send_frame(&self, frame: &str) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(HubError::Connection(format!("{} already closed", self.peer)));
        }

        let mut writer = self.writer.lock().await;
        writer
            .send(Bytes::copy_from_slice(frame.as_bytes()))
            .await
            .map_err(|e| HubError::Connection(e.to_string()))?;

        tracing::debug!("Sent {} bytes to {}", frame.len(), self.peer);
        Ok(())
    }

    fn closed(&self) -> &CancellationToken {
        &self.closed
    }
}

/// In-process connection backed by an unbounded channel.
///
/// Lets an embedding program attach a participant (a bot, a bridge to
/// another transport) without a socket. Hand it with a stream of inbound
/// frames to [`crate::net::serve_connection`], which registers it for the
/// life of the stream, and read delivered frames from the returned receiver.
/// Dropping the receiver makes every later send fail, which is how a dead
/// peer looks to the hub.
pub struct ChannelConnection {
    tx: mpsc::UnboundedSender<String>,
    closed: CancellationToken,
}

impl ChannelConnection {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Self {
            tx,
            closed: CancellationToken::new(),
        };
        (conn, rx)
    }
}

#[async_trait]
impl Outbound for ChannelConnection {
    async fn send_frame(&self, frame: &str) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(HubError::Connection("channel closed".to_string()));
        }
        self.tx
            .send(frame.to_string())
            .map_err(|_| HubError::Connection("receiver dropped".to_string()))
    }

    fn closed(&self) -> &CancellationToken {
        &self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_channel_connection_delivers() {
        let (conn, mut rx) = ChannelConnection::new();
        assert_ok!(conn.send_frame("{\"type\":\"status\"}").await);

        assert_eq!(rx.recv().await.unwrap(), "{\"type\":\"status\"}");
    }

    #[tokio::test]
    async fn test_channel_connection_fails_after_receiver_drop() {
        let (conn, rx) = ChannelConnection::new();
        drop(rx);

        let err = assert_err!(conn.send_frame("{}").await);
        assert!(matches!(err, HubError::Connection(_)));
    }

    #[tokio::test]
    async fn test_closed_connection_refuses_frames() {
        let (conn, _rx) = ChannelConnection::new();
        conn.close();

        assert!(conn.is_closed());
        assert_err!(conn.send_frame("{}").await);
    }
}
