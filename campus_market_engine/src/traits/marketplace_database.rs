use chrono::Duration;
use cmp_common::Money;
use thiserror::Error;

use crate::{
    db_types::{Bid, BidStatus, Listing, NewBid, Order, OrderItem, Payment, PaymentUpdate},
    mkt_api::payment_objects::PaymentOutcome,
    traits::data_objects::{BidAcceptance, CounterOutcome, OrderWithItems, Settlement},
};

/// Bid negotiation state machine operations.
///
/// Every method that mutates state applies all of its effects in a single atomic transaction, and
/// performs its validation (actor authorisation, state checks, floor checks) inside that same
/// transaction so that two racing callers cannot interleave.
#[allow(async_fn_in_trait)]
pub trait BidManagement: Send + Sync {
    /// Validates and stores a new `Pending` bid.
    ///
    /// Fails if the listing does not allow bidding, the buyer is the seller, or the price is
    /// below the listing's floor. Returns the bid together with the listing it targets.
    async fn insert_bid(&self, bid: NewBid) -> Result<(Bid, Listing), MarketplaceError>;

    async fn fetch_bid(&self, bid_id: i64) -> Result<Option<Bid>, MarketplaceError>;

    async fn fetch_listing(&self, listing_id: i64) -> Result<Option<Listing>, MarketplaceError>;

    /// Records a seller's counter-offer against `bid_id`.
    ///
    /// The original bid is marked `Countered` and kept as immutable negotiation history; the
    /// counter is inserted as a *new* row (same listing and buyer, new price/terms), also in
    /// `Countered` status. Fails unless the actor is the listing's seller and the bid is open.
    async fn counter_bid(
        &self,
        bid_id: i64,
        actor: i64,
        price: Money,
        terms: Option<String>,
    ) -> Result<CounterOutcome, MarketplaceError>;

    /// Accepts one bid and applies the full cascade as one unit: the bid becomes `Accepted`,
    /// every other open bid on the listing becomes `Rejected`, the listing is parked `Inactive`,
    /// and a `Pending` order for the bid price is created and linked onto the bid.
    ///
    /// The listing row acts as the serialisation point: it must still be `Active` when the
    /// transaction runs, so a second concurrent accept on the same listing fails with
    /// [`MarketplaceError::ListingUnavailable`] instead of interleaving.
    async fn accept_bid(&self, bid_id: i64, actor: i64) -> Result<BidAcceptance, MarketplaceError>;

    /// Accepts the strictly highest-priced `Pending` bid on the listing, then runs the same
    /// cascade as [`Self::accept_bid`].
    ///
    /// Equal prices are broken by earliest `created_at` (then lowest id), so the comparator is
    /// deterministic: the buyer who offered the winning price first wins.
    async fn finalize_highest_bid(&self, listing_id: i64, actor: i64) -> Result<BidAcceptance, MarketplaceError>;

    /// Seller declines a single open bid.
    async fn reject_bid(&self, bid_id: i64, actor: i64) -> Result<Bid, MarketplaceError>;

    /// Marks a `Pending` bid as `Countered` without recording a counter-offer price. The full
    /// counter path is [`Self::counter_bid`]; this exists for the generic status-update surface.
    async fn mark_bid_countered(&self, bid_id: i64, actor: i64) -> Result<Bid, MarketplaceError>;

    /// Expires open bids that have not been touched within `older_than`. Returns the expired
    /// bids.
    async fn expire_stale_bids(&self, older_than: Duration) -> Result<Vec<Bid>, MarketplaceError>;

    async fn fetch_bids_for_listing(&self, listing_id: i64) -> Result<Vec<Bid>, MarketplaceError>;

    async fn fetch_bids_for_user(&self, buyer_id: i64) -> Result<Vec<Bid>, MarketplaceError>;

    /// The number of open (`Pending` or `Countered`) bids on a listing.
    async fn active_bid_count(&self, listing_id: i64) -> Result<i64, MarketplaceError>;
}

/// Order assembly and retrieval.
#[allow(async_fn_in_trait)]
pub trait OrderManagement: Send + Sync {
    /// Builds a `Pending` order from the user's cart, snapshotting each line at the cart's
    /// recorded unit price, and clears the cart in the same transaction. Fails on an empty cart.
    async fn order_from_cart(&self, user_id: i64) -> Result<OrderWithItems, MarketplaceError>;

    /// Returns the order for an accepted bid, creating and linking it if it does not exist yet.
    ///
    /// Idempotent: if the bid already carries an order reference the existing order is reused,
    /// so a buyer can safely re-invoke "pay" after a previous attempt partially completed.
    async fn order_for_bid(&self, bid_id: i64, buyer_id: i64) -> Result<(Order, Bid), MarketplaceError>;

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, MarketplaceError>;

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, MarketplaceError>;
}

/// Payment record reconciliation and terminal settlement.
#[allow(async_fn_in_trait)]
pub trait PaymentReconciliation: Send + Sync {
    /// Converges the three racing creation paths (synchronous checkout, "intent created"
    /// webhook, terminal webhook) onto exactly one payment row.
    ///
    /// Lookup is by intent id first (merging in a newly known order id or receipt URL, only
    /// where currently absent), then by order id (adopting a changed intent id across retried
    /// checkout attempts), and only then is a new `Pending` row inserted. The merge is
    /// monotonic: known fields are never overwritten with different values, and a unique
    /// constraint on each key backs the whole procedure against true concurrent duplicates.
    async fn reconcile_payment(&self, update: PaymentUpdate) -> Result<Payment, MarketplaceError>;

    /// Applies a terminal payment outcome and all of its side effects as one unit, exactly once.
    ///
    /// The idempotency gate (load current status, compare, conditionally apply) runs inside the
    /// same transaction as the writes. Duplicate deliveries return
    /// [`Settlement::AlreadySettled`]; the first delivery transitions the payment, the order,
    /// and then either decrements stock (cart-sourced) or resolves the bid and its listing
    /// (bid-sourced).
    async fn settle_payment(
        &self,
        update: PaymentUpdate,
        outcome: PaymentOutcome,
    ) -> Result<Settlement, MarketplaceError>;

    /// Merges a late-arriving receipt URL onto the payment for `intent_id`, if that payment
    /// exists and has no receipt yet. Returns the updated payment, or `None` when there was
    /// nothing to update.
    async fn attach_receipt(&self, intent_id: &str, receipt_url: &str) -> Result<Option<Payment>, MarketplaceError>;

    async fn fetch_payment_by_intent(&self, intent_id: &str) -> Result<Option<Payment>, MarketplaceError>;

    async fn fetch_payment_for_order(&self, order_id: i64) -> Result<Option<Payment>, MarketplaceError>;
}

/// The highest level of behaviour for backends supporting the campus market engine.
#[allow(async_fn_in_trait)]
pub trait MarketplaceDatabase: Clone + BidManagement + OrderManagement + PaymentReconciliation {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), MarketplaceError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum MarketplaceError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("The requested listing {0} does not exist")]
    ListingNotFound(i64),
    #[error("The requested bid {0} does not exist")]
    BidNotFound(i64),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(i64),
    #[error("No payment record exists for intent {0}")]
    PaymentNotFound(String),
    #[error("A concurrent writer created the payment record for intent {0} first")]
    PaymentCollision(String),
    #[error("Listing {0} is not open for bidding")]
    BiddingClosed(i64),
    #[error("Sellers cannot bid on their own listing {0}")]
    SelfBid(i64),
    #[error("Bid of {offered} is below the listing floor of {floor}")]
    BidBelowFloor { offered: Money, floor: Money },
    #[error("User {actor} is not the seller of listing {listing_id}")]
    NotListingSeller { actor: i64, listing_id: i64 },
    #[error("User {actor} is not the buyer on bid {bid_id}")]
    NotBidOwner { actor: i64, bid_id: i64 },
    #[error("Bid {bid_id} is {status} and cannot be acted on in that state")]
    BidNotOpen { bid_id: i64, status: BidStatus },
    #[error("Bid {bid_id} is {status}; only accepted bids can be paid for")]
    BidNotAccepted { bid_id: i64, status: BidStatus },
    #[error("A bid cannot move from {from} to {to} through this path")]
    InvalidBidTransition { from: BidStatus, to: BidStatus },
    #[error("Listing {0} has no open bids to finalize")]
    NoOpenBids(i64),
    #[error("Listing {0} was accepted or closed by a concurrent request")]
    ListingUnavailable(i64),
    #[error("User {0} has no items in their cart")]
    EmptyCart(i64),
    #[error("Order {0} is no longer pending")]
    OrderNotPending(i64),
}

impl From<sqlx::Error> for MarketplaceError {
    fn from(e: sqlx::Error) -> Self {
        MarketplaceError::DatabaseError(e.to_string())
    }
}
