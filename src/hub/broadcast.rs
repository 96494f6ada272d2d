//! Fan-out of published messages to every connection

use crate::advisory::Advice;
use crate::error::{HubError, Result};
use crate::net::Outbound;
use crate::protocol::ServerFrame;
use crate::store::MessageStore;
use crate::types::{ChatMessage, ClientId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

use super::state::HubState;

/// Owns the hub state and serialises every publish.
///
/// The state lock is held for the whole persist-then-deliver sequence, so
/// all clients observe published messages in the same order and the store
/// records them in that order too.
pub struct BroadcastHub {
    state: Mutex<HubState>,
    store: Arc<dyn MessageStore>,
    write_timeout: Duration,
}

impl BroadcastHub {
    pub fn new(store: Arc<dyn MessageStore>, write_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(HubState::new()),
            store,
            write_timeout,
        }
    }

    /// Lock the shared state
    pub async fn state(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().await
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    pub async fn register(&self, connection: Arc<dyn Outbound>) -> ClientId {
        self.state.lock().await.register(connection)
    }

    /// Drop a connection and everything it owned. Returns false when the
    /// connection was already gone.
    pub async fn unregister(&self, id: ClientId) -> bool {
        match self.state.lock().await.unregister(id) {
            Some(client) => {
                client.connection.close();
                true
            }
            None => false,
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.state.lock().await.registry().len()
    }

    /// Persist a participant message and deliver its echo to everyone.
    ///
    /// Returns how many connections received it.
    pub async fn publish(&self, message: ChatMessage) -> usize {
        match ServerFrame::echo(&message) {
            Some(frame) => self.fan_out(&message, &frame).await,
            None => {
                tracing::warn!("Refusing to publish {:?} without its frame", message.kind);
                0
            }
        }
    }

    /// Persist and deliver an advisory result, regardless of roles
    pub async fn publish_advisory(&self, advice: &Advice) -> usize {
        let message = ChatMessage::advisory(advice.fair_price, &advice.suggestion);
        let frame = ServerFrame::advisory(advice, message.timestamp);
        self.fan_out(&message, &frame).await
    }

    /// Send one frame to a single connection, bounded by the write timeout
    pub async fn send_to(&self, connection: &dyn Outbound, frame: &ServerFrame) -> Result<()> {
        let encoded = frame.encode()?;
        self.write(connection, &encoded).await
    }

    async fn write(&self, connection: &dyn Outbound, encoded: &str) -> Result<()> {
        match tokio::time::timeout(self.write_timeout, connection.send_frame(encoded)).await {
            Ok(result) => result,
            Err(_) => Err(HubError::Connection(format!(
                "write timed out after {:?}",
                self.write_timeout
            ))),
        }
    }

    async fn fan_out(&self, message: &ChatMessage, frame: &ServerFrame) -> usize {
        let encoded = match frame.encode() {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!("Failed to encode {:?} frame: {}", message.kind, e);
                return 0;
            }
        };

        let mut state = self.state.lock().await;

        if let Err(e) = self.store.append(message).await {
            tracing::warn!("Failed to persist {:?} message: {}", message.kind, e);
        }

        let mut delivered = 0;
        let mut dead = Vec::new();

        for client in state.registry().clients() {
            match self.write(client.connection.as_ref(), &encoded).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(client = %client.id, "Failed to send: {}", e);
                    dead.push(client.id);
                }
            }
        }

        for id in dead {
            if let Some(client) = state.unregister(id) {
                client.connection.close();
                tracing::info!("Removed {} after failed delivery", id);
            }
        }

        tracing::debug!(kind = ?message.kind, delivered, "Published message");
        delivered
    }
}
