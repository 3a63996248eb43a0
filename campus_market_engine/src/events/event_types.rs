use crate::db_types::{Bid, Listing, Order};

//-------------------------------------- Bid lifecycle events --------------------------------------------------------

/// A new bid landed on a listing. Subscribers typically notify the seller.
#[derive(Debug, Clone)]
pub struct BidPlacedEvent {
    pub bid: Bid,
    pub listing: Listing,
}

/// The seller countered a bid. Subscribers typically notify the buyer of the new price.
#[derive(Debug, Clone)]
pub struct BidCounteredEvent {
    pub original: Bid,
    pub counter: Bid,
}

/// A bid lost, either by direct rejection or because a competing bid was accepted.
#[derive(Debug, Clone)]
pub struct BidRejectedEvent {
    pub bid: Bid,
}

/// A bid was accepted and converted into an order awaiting payment.
#[derive(Debug, Clone)]
pub struct BidAcceptedEvent {
    pub bid: Bid,
    pub order: Order,
}

//-------------------------------------- Settlement events -----------------------------------------------------------

/// An order's payment settled successfully. `bid`/`seller_id` are set for bid-sourced orders so
/// that both parties can be notified.
#[derive(Debug, Clone)]
pub struct OrderPaidEvent {
    pub order: Order,
    pub bid: Option<Bid>,
    pub seller_id: Option<i64>,
}

/// An order's payment failed. For bid-sourced orders the listing has been made biddable again
/// and the buyer may retry.
#[derive(Debug, Clone)]
pub struct PaymentFailedEvent {
    pub order: Order,
    pub bid: Option<Bid>,
    pub seller_id: Option<i64>,
    pub reason: String,
}
