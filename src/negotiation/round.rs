//! Per-role pending prices for the current negotiation round

use crate::types::{PricePair, Role};

/// The single, resettable round record.
///
/// A round is complete once both roles have a pending price. Completion is
/// observed through [`NegotiationRound::try_resolve`], which consumes both
/// prices at once so a pair can never be read twice.
#[derive(Clone, Debug, Default)]
pub struct NegotiationRound {
    buyer_price: Option<f64>,
    seller_price: Option<f64>,
}

impl NegotiationRound {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` as the pending price for `role`, replacing any earlier one
    pub fn submit_price(&mut self, role: Role, value: f64) {
        *self.slot(role) = Some(value);
    }

    /// Take both prices if the round is complete, otherwise leave it alone
    pub fn try_resolve(&mut self) -> Option<PricePair> {
        match (self.seller_price, self.buyer_price) {
            (Some(seller_price), Some(buyer_price)) => {
                self.seller_price = None;
                self.buyer_price = None;
                Some(PricePair {
                    seller_price,
                    buyer_price,
                })
            }
            _ => None,
        }
    }

    /// Drop the pending price for `role`, returning it if there was one
    pub fn clear(&mut self, role: Role) -> Option<f64> {
        self.slot(role).take()
    }

    /// Pending price for `role`, if any
    pub fn pending(&self, role: Role) -> Option<f64> {
        match role {
            Role::Buyer => self.buyer_price,
            Role::Seller => self.seller_price,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buyer_price.is_none() && self.seller_price.is_none()
    }

    fn slot(&mut self, role: Role) -> &mut Option<f64> {
        match role {
            Role::Buyer => &mut self.buyer_price,
            Role::Seller => &mut self.seller_price,
        }
    }
}
