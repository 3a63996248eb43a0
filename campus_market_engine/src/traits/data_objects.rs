use serde::{Deserialize, Serialize};

use crate::db_types::{Bid, Listing, Order, OrderItem, Payment};

/// The full result of accepting one bid: the winner, the losers, the parked listing, and the
/// order that now awaits payment. Everything in here was applied in a single transaction.
#[derive(Debug, Clone)]
pub struct BidAcceptance {
    pub accepted: Bid,
    pub rejected: Vec<Bid>,
    pub listing: Listing,
    pub order: Order,
}

/// A seller's counter-offer: the original bid (now immutable history) and the new row that
/// carries the countered price.
#[derive(Debug, Clone)]
pub struct CounterOutcome {
    pub original: Bid,
    pub counter: Bid,
    pub listing: Listing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// What a settlement call actually did. Duplicate webhook deliveries land on the no-op arms
/// rather than erroring, so callers can always acknowledge the event.
#[derive(Debug, Clone)]
pub enum Settlement {
    /// The terminal transition was applied, with all side effects, exactly once.
    Applied(SettlementOutcome),
    /// The payment was already at the implied terminal status (duplicate delivery), or another
    /// terminal event won the race. Nothing was changed.
    AlreadySettled(Payment),
    /// The payment reached a terminal status but no order is linked to it yet, so there were no
    /// side effects to apply. A later reconciliation merge can still attach the order.
    Unmatched(Payment),
}

#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub payment: Payment,
    pub order: Order,
    /// Present when the order was sourced from a bid.
    pub bid: Option<Bid>,
    /// The bid's listing after its settlement transition (Sold on success, Active on failure).
    pub listing: Option<Listing>,
    /// Cart-sourced sales only: listings whose stock hit zero and flipped to Sold.
    pub sold_out: Vec<i64>,
}
