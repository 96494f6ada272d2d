//! Negotiation state: who is connected, who holds which role, and the
//! pending prices of the current round

pub mod price;
pub mod registry;
pub mod round;

pub use price::{extract_lenient, parse_strict};
pub use registry::{Client, ConnectionRegistry, RoleAssignment};
pub use round::NegotiationRound;
