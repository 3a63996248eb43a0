use std::fmt::Display;

use campus_market_engine::db_types::BidStatus;
use cmp_common::Money;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBidRequest {
    pub listing_id: i64,
    /// Offered price in cents.
    pub price: Money,
    #[serde(default)]
    pub terms: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterBidRequest {
    /// Counter-offer price in cents.
    pub price: Money,
    #[serde(default)]
    pub terms: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidStatusUpdateRequest {
    pub status: BidStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResponse {
    /// The hosted payment page to redirect the buyer to.
    pub checkout_url: String,
    pub order_id: i64,
    pub payment_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveBidCountResponse {
    pub listing_id: i64,
    pub active_bids: i64,
}
