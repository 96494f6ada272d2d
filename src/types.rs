//! Core types used throughout the hub

use crate::error::HubError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of one live connection, assigned in connection order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client_{}", self.0)
    }
}

/// Negotiation counterparty
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Buyer,
    Seller,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Buyer => "buyer",
            Role::Seller => "seller",
        }
    }

    /// The other side of the table
    pub fn counterpart(&self) -> Role {
        match self {
            Role::Buyer => Role::Seller,
            Role::Seller => Role::Buyer,
        }
    }
}

impl FromStr for Role {
    type Err = HubError;

    /// Only the exact lowercase names are accepted
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buyer" => Ok(Role::Buyer),
            "seller" => Ok(Role::Seller),
            other => Err(HubError::RoleInvalid(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a chat message is attributed to. `Ai` is reserved for advisory results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    Buyer,
    Seller,
    Ai,
}

impl From<Role> for SenderRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Buyer => SenderRole::Buyer,
            Role::Seller => SenderRole::Seller,
        }
    }
}

impl fmt::Display for SenderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SenderRole::Buyer => "buyer",
            SenderRole::Seller => "seller",
            SenderRole::Ai => "ai",
        };
        f.write_str(name)
    }
}

/// Kind of a persisted chat message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Chat,
    PriceSell,
    Purchase,
    AiResponse,
}

/// One published event. Written once, never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub kind: MessageKind,
    pub sender_role: SenderRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fair_price: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Build a message sent by a participant, stamped now
    pub fn from_participant(kind: MessageKind, role: Role, content: impl Into<String>) -> Self {
        Self {
            kind,
            sender_role: role.into(),
            content: content.into(),
            fair_price: None,
            timestamp: Utc::now(),
        }
    }

    /// Build the advisory result message attributed to the reserved `ai` sender
    pub fn advisory(fair_price: f64, suggestion: &str) -> Self {
        Self {
            kind: MessageKind::AiResponse,
            sender_role: SenderRole::Ai,
            content: format!("fair price {:.2}: {}", fair_price, suggestion),
            fair_price: Some(fair_price),
            timestamp: Utc::now(),
        }
    }
}

/// Both sides' prices for one completed round
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PricePair {
    pub seller_price: f64,
    pub buyer_price: f64,
}
