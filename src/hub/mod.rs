//! The negotiation hub: shared state, broadcast and message routing

pub mod broadcast;
pub mod router;
pub mod state;

pub use broadcast::BroadcastHub;
pub use router::MessageRouter;
pub use state::HubState;
