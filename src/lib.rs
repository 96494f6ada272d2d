//! Haggle negotiation hub
//!
//! A single hub where one buyer and one seller haggle over a price while any
//! number of observers watch. Every chat line and price move is broadcast to
//! all connected clients. Once both sides have named a price the pair is sent
//! to an external advisory service, and its fair-price suggestion is broadcast
//! as a message from the reserved `ai` sender.

pub mod advisory;
pub mod cli;
pub mod config;
pub mod error;
pub mod hub;
pub mod negotiation;
pub mod net;
pub mod protocol;
pub mod store;
pub mod types;

pub use advisory::{Advice, AdvisoryClient};
pub use config::HubConfig;
pub use error::{HubError, Result};
pub use hub::{BroadcastHub, MessageRouter};
pub use net::HubServer;
pub use types::{ChatMessage, ClientId, MessageKind, PricePair, Role, SenderRole};
