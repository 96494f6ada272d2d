//! Per-frame dispatch of client messages

use crate::advisory::AdvisoryClient;
use crate::error::{HubError, Result};
use crate::negotiation::{extract_lenient, parse_strict};
use crate::net::Outbound;
use crate::protocol::{ClientMessage, ServerFrame};
use crate::types::{ChatMessage, ClientId, MessageKind, PricePair};
use std::sync::Arc;

use super::broadcast::BroadcastHub;

/// Routes decoded client messages to the hub.
///
/// Input errors are answered on the sender's connection only. An `Err`
/// returned from here means the connection itself is unusable.
pub struct MessageRouter {
    hub: Arc<BroadcastHub>,
    advisory: AdvisoryClient,
}

impl MessageRouter {
    pub fn new(hub: Arc<BroadcastHub>, advisory: AdvisoryClient) -> Self {
        Self { hub, advisory }
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// Decode and handle one raw frame from `id`
    pub async fn handle_frame(&self, id: ClientId, conn: &dyn Outbound, data: &[u8]) -> Result<()> {
        match ClientMessage::decode(data) {
            Ok(message) => self.dispatch(id, conn, message).await,
            Err(e) => {
                tracing::debug!("Malformed frame from {}: {}", id, e);
                self.hub.send_to(conn, &ServerFrame::error(&e)).await
            }
        }
    }

    pub async fn dispatch(&self, id: ClientId, conn: &dyn Outbound, message: ClientMessage) -> Result<()> {
        tracing::debug!("{} sent {}", id, message.kind());

        let outcome = match message {
            ClientMessage::Role { role } => return self.handle_role(id, conn, &role).await,
            ClientMessage::Chat { content } => self.handle_chat(id, content).await,
            ClientMessage::PriceUpdate { content } => self.handle_price_update(id, content).await,
            ClientMessage::Purchase { content } => self.handle_purchase(id, content).await,
            ClientMessage::Unknown(kind) => Err(HubError::UnknownMessageType(kind)),
        };

        match outcome {
            Err(e) if e.is_client_error() => {
                tracing::debug!("Rejected message from {}: {}", id, e);
                self.hub.send_to(conn, &ServerFrame::error(&e)).await
            }
            other => other,
        }
    }

    async fn handle_role(&self, id: ClientId, conn: &dyn Outbound, role: &str) -> Result<()> {
        let assigned = self.hub.state().await.assign_role(id, role);

        let reply = match assigned {
            Ok(role) => {
                tracing::info!(client = %id, role = %role, "Role assigned");
                ServerFrame::ack(format!("role set: {}", role))
            }
            Err(e) if e.is_client_error() => {
                tracing::debug!("{} sent an invalid role: {}", id, e);
                ServerFrame::nack(&e)
            }
            Err(e) => return Err(e),
        };

        self.hub.send_to(conn, &reply).await
    }

    async fn handle_chat(&self, id: ClientId, content: String) -> Result<()> {
        let role = self.hub.state().await.require_role(id)?;
        let implied = extract_lenient(&content);

        self.hub
            .publish(ChatMessage::from_participant(MessageKind::Chat, role, content))
            .await;

        if let Some(price) = implied {
            let resolved = {
                let mut state = self.hub.state().await;
                // The publish may have dropped or demoted the sender
                if state.registry().role_of(id) != Some(role) {
                    tracing::debug!("{} no longer holds {}, ignoring implied price", id, role);
                    return Ok(());
                }
                tracing::debug!("{} implied a {} price of {}", id, role, price);
                state.submit_and_resolve(role, price)
            };
            self.resolve(resolved).await;
        }

        Ok(())
    }

    async fn handle_price_update(&self, id: ClientId, content: String) -> Result<()> {
        let (role, resolved) = {
            let mut state = self.hub.state().await;
            let role = state.require_role(id)?;
            let price = parse_strict(&content)?;
            tracing::info!(client = %id, role = %role, price, "Price submitted");
            let resolved = state.submit_and_resolve(role, price);
            if resolved.is_none() {
                tracing::debug!("Waiting on the {}", role.counterpart());
            }
            (role, resolved)
        };

        self.hub
            .publish(ChatMessage::from_participant(MessageKind::PriceSell, role, content))
            .await;
        self.resolve(resolved).await;

        Ok(())
    }

    async fn handle_purchase(&self, id: ClientId, content: String) -> Result<()> {
        let role = self.hub.state().await.require_role(id)?;
        tracing::info!("{} confirmed a purchase", id);

        self.hub
            .publish(ChatMessage::from_participant(MessageKind::Purchase, role, content))
            .await;

        Ok(())
    }

    /// Consult the advisory service for a completed round.
    ///
    /// Runs without the state lock. On failure the round stays consumed and
    /// nobody is told; the next pair of prices starts a fresh round.
    async fn resolve(&self, resolved: Option<PricePair>) {
        let Some(prices) = resolved else {
            return;
        };

        tracing::info!(
            seller = prices.seller_price,
            buyer = prices.buyer_price,
            "Round complete, requesting fair price"
        );

        match self.advisory.evaluate(prices).await {
            Ok(advice) => {
                let delivered = self.hub.publish_advisory(&advice).await;
                tracing::info!(
                    fair_price = advice.fair_price,
                    delivered,
                    "Broadcast advisory result"
                );
            }
            Err(e) => {
                tracing::warn!("Advisory failed, round abandoned: {}", e);
            }
        }
    }
}
