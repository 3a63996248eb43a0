use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use cmp_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid status value: {0}")]
pub struct ConversionError(String);

//--------------------------------------   ListingStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum ListingStatus {
    /// The listing is live: it can be bought and, if configured, bid on.
    Active,
    /// The listing is hidden from buyers. Acceptance of a bid parks the listing here until the
    /// payment outcome is known.
    Inactive,
    /// All stock is gone. Terminal.
    Sold,
}

impl Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListingStatus::Active => write!(f, "Active"),
            ListingStatus::Inactive => write!(f, "Inactive"),
            ListingStatus::Sold => write!(f, "Sold"),
        }
    }
}

impl FromStr for ListingStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(Self::Active),
            "Inactive" => Ok(Self::Inactive),
            "Sold" => Ok(Self::Sold),
            s => Err(ConversionError(format!("Invalid listing status: {s}"))),
        }
    }
}

//--------------------------------------      Listing        ---------------------------------------------------------
/// The subset of a listing that the engine owns: bidding configuration, stock, and status.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Listing {
    pub id: i64,
    pub seller_id: i64,
    pub title: String,
    pub price: Money,
    /// The lowest bid the seller will entertain. `None` means any price is acceptable.
    pub floor_price: Option<Money>,
    pub allow_bids: bool,
    pub quantity: i64,
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    /// A listing accepts new bids only while it is live and bidding is enabled.
    pub fn is_biddable(&self) -> bool {
        self.allow_bids && self.status == ListingStatus::Active
    }
}

//--------------------------------------     BidStatus       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum BidStatus {
    /// Awaiting a decision from the seller.
    Pending,
    /// Superseded by a counter-offer. The counter-offer itself also carries this status until
    /// the buyer or seller resolves it, so a countered negotiation stays "open".
    Countered,
    /// The seller accepted; an order exists and payment is awaited.
    Accepted,
    /// Declined, either directly or because a competing bid was accepted. Terminal.
    Rejected,
    /// Timed out without a decision. Terminal.
    Expired,
    /// Payment settled successfully. Terminal; reachable only through settlement.
    Paid,
}

impl BidStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, BidStatus::Pending | BidStatus::Countered)
    }
}

impl Display for BidStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BidStatus::Pending => write!(f, "Pending"),
            BidStatus::Countered => write!(f, "Countered"),
            BidStatus::Accepted => write!(f, "Accepted"),
            BidStatus::Rejected => write!(f, "Rejected"),
            BidStatus::Expired => write!(f, "Expired"),
            BidStatus::Paid => write!(f, "Paid"),
        }
    }
}

impl FromStr for BidStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Countered" => Ok(Self::Countered),
            "Accepted" => Ok(Self::Accepted),
            "Rejected" => Ok(Self::Rejected),
            "Expired" => Ok(Self::Expired),
            "Paid" => Ok(Self::Paid),
            s => Err(ConversionError(format!("Invalid bid status: {s}"))),
        }
    }
}

//--------------------------------------        Bid          ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Bid {
    pub id: i64,
    pub listing_id: i64,
    pub buyer_id: i64,
    pub price: Money,
    /// Free-text terms attached by whoever made the offer ("pickup only", etc).
    pub terms: Option<String>,
    pub status: BidStatus,
    /// Set once the bid has been accepted and converted into an order.
    pub order_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       NewBid        ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewBid {
    pub listing_id: i64,
    pub buyer_id: i64,
    pub price: Money,
    pub terms: Option<String>,
}

impl NewBid {
    pub fn new(listing_id: i64, buyer_id: i64, price: Money) -> Self {
        Self { listing_id, buyer_id, price, terms: None }
    }

    pub fn with_terms<S: Into<String>>(mut self, terms: S) -> Self {
        self.terms = Some(terms.into());
        self
    }
}

//--------------------------------------    OrderStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Created and awaiting payment.
    Pending,
    /// Payment settled. Terminal.
    Completed,
    /// Payment failed or the order was abandoned. Terminal.
    Cancelled,
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "Pending"),
            OrderStatus::Completed => write!(f, "Completed"),
            OrderStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Completed" => Ok(Self::Completed),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------       Order         ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub total_price: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub listing_id: i64,
    pub quantity: i64,
    /// Price per unit at the time the order was assembled, decoupled from the live listing price.
    pub unit_price: Money,
}

//--------------------------------------     CartItem        ---------------------------------------------------------
/// A line in a user's cart. The engine only ever reads and clears these; cart management itself
/// lives elsewhere.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CartItem {
    pub id: i64,
    pub user_id: i64,
    pub listing_id: i64,
    pub quantity: i64,
    pub unit_price: Money,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------   PaymentStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Completed => write!(f, "Completed"),
            PaymentStatus::Failed => write!(f, "Failed"),
            PaymentStatus::Refunded => write!(f, "Refunded"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            "Refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------      Payment        ---------------------------------------------------------
/// The local record of a gateway payment attempt.
///
/// A payment is discoverable by its gateway intent id, by its order id, or by both, and either
/// key can be the one that arrives first. The reconciler merges information onto whichever row
/// already exists rather than ever creating a second one.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub order_id: Option<i64>,
    pub intent_id: Option<String>,
    pub status: PaymentStatus,
    pub amount: Money,
    pub currency: String,
    pub receipt_url: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------   PaymentUpdate     ---------------------------------------------------------
/// Everything a gateway event (or the synchronous checkout path) can tell us about a payment.
/// All fields except the intent id are optional; the reconciler merges whatever is present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentUpdate {
    pub intent_id: String,
    pub order_id: Option<i64>,
    pub amount: Money,
    pub currency: Option<String>,
    pub receipt_url: Option<String>,
    pub failure_reason: Option<String>,
}

impl PaymentUpdate {
    pub fn new<S: Into<String>>(intent_id: S, amount: Money) -> Self {
        Self { intent_id: intent_id.into(), amount, ..Default::default() }
    }

    pub fn for_order(mut self, order_id: i64) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn with_receipt<S: Into<String>>(mut self, url: S) -> Self {
        self.receipt_url = Some(url.into());
        self
    }

    pub fn with_failure_reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_round_trips() {
        for s in [BidStatus::Pending, BidStatus::Countered, BidStatus::Accepted, BidStatus::Rejected, BidStatus::Expired, BidStatus::Paid] {
            assert_eq!(s.to_string().parse::<BidStatus>().unwrap(), s);
        }
        for s in [OrderStatus::Pending, OrderStatus::Completed, OrderStatus::Cancelled] {
            assert_eq!(s.to_string().parse::<OrderStatus>().unwrap(), s);
        }
        assert!("Garbage".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn open_bids() {
        assert!(BidStatus::Pending.is_open());
        assert!(BidStatus::Countered.is_open());
        assert!(!BidStatus::Paid.is_open());
        assert!(!BidStatus::Accepted.is_open());
    }
}
