//! Registry of live connections and the role each one holds

use crate::error::{HubError, Result};
use crate::net::Outbound;
use crate::types::{ClientId, Role};
use std::collections::HashMap;
use std::sync::Arc;

/// One live connection
#[derive(Clone)]
pub struct Client {
    pub id: ClientId,
    pub connection: Arc<dyn Outbound>,
    pub role: Option<Role>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("role", &self.role)
            .finish()
    }
}

/// What changed when a role was assigned
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoleAssignment {
    /// Client that held the role before and was demoted to roleless
    pub displaced: Option<ClientId>,
    /// Role the client gave up by switching sides
    pub released: Option<Role>,
}

/// Tracks every connection plus a role -> newest holder index
#[derive(Default)]
pub struct ConnectionRegistry {
    next_id: u64,
    clients: HashMap<ClientId, Client>,
    roles: HashMap<Role, ClientId>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection with no role and hand back its fresh id
    pub fn register(&mut self, connection: Arc<dyn Outbound>) -> ClientId {
        self.next_id += 1;
        let id = ClientId(self.next_id);

        self.clients.insert(
            id,
            Client {
                id,
                connection,
                role: None,
            },
        );

        id
    }

    /// Give `id` the role named `role`.
    ///
    /// The newest claimant always wins. A previous holder keeps its
    /// connection but loses its role.
    pub fn assign_role(&mut self, id: ClientId, role: &str) -> Result<RoleAssignment> {
        let role: Role = role.parse()?;

        let current = self
            .clients
            .get(&id)
            .ok_or_else(|| HubError::Connection(format!("{} is not registered", id)))?
            .role;

        if current == Some(role) {
            return Ok(RoleAssignment::default());
        }

        let mut assignment = RoleAssignment::default();

        if let Some(old_role) = current {
            if self.roles.get(&old_role) == Some(&id) {
                self.roles.remove(&old_role);
            }
            assignment.released = Some(old_role);
        }

        if let Some(previous) = self.roles.insert(role, id) {
            if let Some(client) = self.clients.get_mut(&previous) {
                client.role = None;
            }
            assignment.displaced = Some(previous);
        }

        if let Some(client) = self.clients.get_mut(&id) {
            client.role = Some(role);
        }

        Ok(assignment)
    }

    /// Forget a connection. Returns the removed client and the role it
    /// still held, if it was that role's current holder.
    pub fn unregister(&mut self, id: ClientId) -> Option<(Client, Option<Role>)> {
        let client = self.clients.remove(&id)?;

        let released = client.role.filter(|role| {
            if self.roles.get(role) == Some(&id) {
                self.roles.remove(role);
                true
            } else {
                false
            }
        });

        Some((client, released))
    }

    pub fn lookup_by_role(&self, role: Role) -> Option<&Client> {
        self.roles.get(&role).and_then(|id| self.clients.get(id))
    }

    pub fn get(&self, id: ClientId) -> Option<&Client> {
        self.clients.get(&id)
    }

    /// Role currently held by `id`
    pub fn role_of(&self, id: ClientId) -> Option<Role> {
        self.clients.get(&id).and_then(|c| c.role)
    }

    pub fn clients(&self) -> impl Iterator<Item = &Client> {
        self.clients.values()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
