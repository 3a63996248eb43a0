use campus_market_engine::{
    db_types::{Bid, BidStatus, Listing, ListingStatus, NewBid, Payment, PaymentStatus, PaymentUpdate},
    mkt_api::payment_objects::PaymentOutcome,
    traits::{BidAcceptance, CounterOutcome, MarketplaceError, Settlement},
    BidManagement,
    PaymentReconciliation,
};
use chrono::{Duration, Utc};
use cmp_common::Money;
use mockall::mock;

mock! {
    pub BidManager {}
    impl BidManagement for BidManager {
        async fn insert_bid(&self, bid: NewBid) -> Result<(Bid, Listing), MarketplaceError>;
        async fn fetch_bid(&self, bid_id: i64) -> Result<Option<Bid>, MarketplaceError>;
        async fn fetch_listing(&self, listing_id: i64) -> Result<Option<Listing>, MarketplaceError>;
        async fn counter_bid(&self, bid_id: i64, actor: i64, price: Money, terms: Option<String>) -> Result<CounterOutcome, MarketplaceError>;
        async fn accept_bid(&self, bid_id: i64, actor: i64) -> Result<BidAcceptance, MarketplaceError>;
        async fn finalize_highest_bid(&self, listing_id: i64, actor: i64) -> Result<BidAcceptance, MarketplaceError>;
        async fn reject_bid(&self, bid_id: i64, actor: i64) -> Result<Bid, MarketplaceError>;
        async fn mark_bid_countered(&self, bid_id: i64, actor: i64) -> Result<Bid, MarketplaceError>;
        async fn expire_stale_bids(&self, older_than: Duration) -> Result<Vec<Bid>, MarketplaceError>;
        async fn fetch_bids_for_listing(&self, listing_id: i64) -> Result<Vec<Bid>, MarketplaceError>;
        async fn fetch_bids_for_user(&self, buyer_id: i64) -> Result<Vec<Bid>, MarketplaceError>;
        async fn active_bid_count(&self, listing_id: i64) -> Result<i64, MarketplaceError>;
    }
}

mock! {
    pub PaymentReconciler {}
    impl PaymentReconciliation for PaymentReconciler {
        async fn reconcile_payment(&self, update: PaymentUpdate) -> Result<Payment, MarketplaceError>;
        async fn settle_payment(&self, update: PaymentUpdate, outcome: PaymentOutcome) -> Result<Settlement, MarketplaceError>;
        async fn attach_receipt(&self, intent_id: &str, receipt_url: &str) -> Result<Option<Payment>, MarketplaceError>;
        async fn fetch_payment_by_intent(&self, intent_id: &str) -> Result<Option<Payment>, MarketplaceError>;
        async fn fetch_payment_for_order(&self, order_id: i64) -> Result<Option<Payment>, MarketplaceError>;
    }
}

//-------------------------------------- Sample rows --------------------------------------------------------------

pub fn sample_listing(id: i64, seller_id: i64) -> Listing {
    Listing {
        id,
        seller_id,
        title: "Mini fridge".to_string(),
        price: Money::from_dollars(100),
        floor_price: Some(Money::from_dollars(50)),
        allow_bids: true,
        quantity: 1,
        status: ListingStatus::Active,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn sample_bid(id: i64, listing_id: i64, buyer_id: i64, price: Money, status: BidStatus) -> Bid {
    Bid {
        id,
        listing_id,
        buyer_id,
        price,
        terms: None,
        status,
        order_id: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn sample_payment(id: i64, intent_id: &str, status: PaymentStatus) -> Payment {
    Payment {
        id,
        order_id: Some(7),
        intent_id: Some(intent_id.to_string()),
        status,
        amount: Money::from_dollars(85),
        currency: "USD".to_string(),
        receipt_url: None,
        failure_reason: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}
