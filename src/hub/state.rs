//! The one piece of shared mutable state in the hub.
//!
//! Connections, roles and the pending round live together so that every
//! mutation happens under a single lock held by [`super::BroadcastHub`].

use crate::error::{HubError, Result};
use crate::negotiation::{Client, ConnectionRegistry, NegotiationRound};
use crate::net::Outbound;
use crate::types::{ClientId, PricePair, Role};
use std::sync::Arc;

#[derive(Default)]
pub struct HubState {
    registry: ConnectionRegistry,
    round: NegotiationRound,
}

impl HubState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, connection: Arc<dyn Outbound>) -> ClientId {
        self.registry.register(connection)
    }

    /// Assign a role. Switching sides drops the pending price of the role
    /// given up.
    pub fn assign_role(&mut self, id: ClientId, role: &str) -> Result<Role> {
        let assignment = self.registry.assign_role(id, role)?;

        if let Some(released) = assignment.released {
            self.round.clear(released);
        }
        if let Some(displaced) = assignment.displaced {
            tracing::info!("{} displaced {} as {}", id, displaced, role);
        }

        self.registry.role_of(id).ok_or(HubError::RoleRequired)
    }

    /// Remove a connection. If it still held a role, that role's pending
    /// price goes with it.
    pub fn unregister(&mut self, id: ClientId) -> Option<Client> {
        let (client, released) = self.registry.unregister(id)?;

        if let Some(role) = released {
            if let Some(price) = self.round.clear(role) {
                tracing::debug!("Dropped pending {} price {} of {}", role, price, id);
            }
        }

        Some(client)
    }

    /// Role held by `id`, or `RoleRequired`
    pub fn require_role(&self, id: ClientId) -> Result<Role> {
        self.registry.role_of(id).ok_or(HubError::RoleRequired)
    }

    /// Record a price and consume the round if both sides are now in
    pub fn submit_and_resolve(&mut self, role: Role, value: f64) -> Option<PricePair> {
        self.round.submit_price(role, value);
        self.round.try_resolve()
    }

    pub fn try_resolve(&mut self) -> Option<PricePair> {
        self.round.try_resolve()
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn round(&self) -> &NegotiationRound {
        &self.round
    }
}
