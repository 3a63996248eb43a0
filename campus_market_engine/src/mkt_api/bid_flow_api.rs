use std::fmt::Debug;

use chrono::Duration;
use cmp_common::Money;
use log::*;

use crate::{
    db_types::{Bid, BidStatus, NewBid},
    events::{BidAcceptedEvent, BidCounteredEvent, BidPlacedEvent, BidRejectedEvent, EventProducers},
    traits::{BidAcceptance, BidManagement, CounterOutcome, MarketplaceError},
};

/// `BidFlowApi` drives the bid negotiation state machine: placing, countering, accepting,
/// rejecting and finalizing bids, plus the read-only queries over them.
///
/// All state transitions happen atomically inside the backend; this layer adds actor-facing
/// orchestration and publishes notification events strictly *after* the transaction has
/// committed, so a slow or broken notification sink can never hold a listing lock.
pub struct BidFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for BidFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BidFlowApi")
    }
}

impl<B> BidFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> BidFlowApi<B>
where B: BidManagement
{
    /// Submit a new bid against a listing.
    ///
    /// Validation (listing open for bidding, buyer is not the seller, price clears the floor)
    /// happens inside the insert transaction. On success the seller is notified best-effort.
    pub async fn place_bid(&self, bid: NewBid) -> Result<Bid, MarketplaceError> {
        let (bid, listing) = self.db.insert_bid(bid).await?;
        debug!("🤝️ Bid #{} of {} placed on listing [{}]", bid.id, bid.price, listing.id);
        for emitter in &self.producers.bid_placed_producer {
            emitter.publish_event(BidPlacedEvent { bid: bid.clone(), listing: listing.clone() }).await;
        }
        Ok(bid)
    }

    /// Record a seller's counter-offer. The original bid becomes immutable history and a new
    /// countered bid row carries the new price.
    pub async fn counter_bid(
        &self,
        bid_id: i64,
        actor: i64,
        price: Money,
        terms: Option<String>,
    ) -> Result<CounterOutcome, MarketplaceError> {
        let outcome = self.db.counter_bid(bid_id, actor, price, terms).await?;
        debug!(
            "🤝️ Bid #{} countered at {} (new bid #{})",
            outcome.original.id, outcome.counter.price, outcome.counter.id
        );
        for emitter in &self.producers.bid_countered_producer {
            emitter
                .publish_event(BidCounteredEvent {
                    original: outcome.original.clone(),
                    counter: outcome.counter.clone(),
                })
                .await;
        }
        Ok(outcome)
    }

    /// Accept a single bid, rejecting all competing open bids, parking the listing, and creating
    /// the order — as one unit.
    pub async fn accept_bid(&self, bid_id: i64, actor: i64) -> Result<BidAcceptance, MarketplaceError> {
        let acceptance = self.db.accept_bid(bid_id, actor).await?;
        self.publish_acceptance(&acceptance).await;
        Ok(acceptance)
    }

    /// Accept the highest-priced pending bid on a listing. Ties go to the earliest bid.
    pub async fn finalize_bidding(&self, listing_id: i64, actor: i64) -> Result<BidAcceptance, MarketplaceError> {
        let acceptance = self.db.finalize_highest_bid(listing_id, actor).await?;
        self.publish_acceptance(&acceptance).await;
        Ok(acceptance)
    }

    async fn publish_acceptance(&self, acceptance: &BidAcceptance) {
        debug!(
            "🤝️ Bid #{} accepted on listing [{}]; {} competing bids rejected, order #{} awaits payment",
            acceptance.accepted.id,
            acceptance.listing.id,
            acceptance.rejected.len(),
            acceptance.order.id
        );
        for emitter in &self.producers.bid_accepted_producer {
            emitter
                .publish_event(BidAcceptedEvent {
                    bid: acceptance.accepted.clone(),
                    order: acceptance.order.clone(),
                })
                .await;
        }
        for emitter in &self.producers.bid_rejected_producer {
            for bid in &acceptance.rejected {
                emitter.publish_event(BidRejectedEvent { bid: bid.clone() }).await;
            }
        }
    }

    /// Change a bid's status on behalf of the seller.
    ///
    /// Only `Accepted`, `Rejected` and `Countered` are reachable through this surface; `Paid` is
    /// reserved for the settlement engine and everything else is rejected up front. Setting
    /// `Accepted` runs the full acceptance cascade.
    pub async fn update_bid_status(
        &self,
        bid_id: i64,
        actor: i64,
        new_status: BidStatus,
    ) -> Result<Bid, MarketplaceError> {
        match new_status {
            BidStatus::Accepted => self.accept_bid(bid_id, actor).await.map(|a| a.accepted),
            BidStatus::Rejected => {
                let bid = self.db.reject_bid(bid_id, actor).await?;
                for emitter in &self.producers.bid_rejected_producer {
                    emitter.publish_event(BidRejectedEvent { bid: bid.clone() }).await;
                }
                Ok(bid)
            },
            BidStatus::Countered => self.db.mark_bid_countered(bid_id, actor).await,
            other => {
                let current = match self.db.fetch_bid(bid_id).await? {
                    Some(b) => b.status,
                    None => return Err(MarketplaceError::BidNotFound(bid_id)),
                };
                Err(MarketplaceError::InvalidBidTransition { from: current, to: other })
            },
        }
    }

    /// Expire open bids that have been idle for longer than `older_than`.
    pub async fn expire_stale_bids(&self, older_than: Duration) -> Result<Vec<Bid>, MarketplaceError> {
        let expired = self.db.expire_stale_bids(older_than).await?;
        if !expired.is_empty() {
            info!("🤝️ {} stale bids expired", expired.len());
        }
        Ok(expired)
    }

    pub async fn bids_for_listing(&self, listing_id: i64) -> Result<Vec<Bid>, MarketplaceError> {
        self.db.fetch_bids_for_listing(listing_id).await
    }

    pub async fn bids_for_user(&self, buyer_id: i64) -> Result<Vec<Bid>, MarketplaceError> {
        self.db.fetch_bids_for_user(buyer_id).await
    }

    pub async fn active_bid_count(&self, listing_id: i64) -> Result<i64, MarketplaceError> {
        self.db.active_bid_count(listing_id).await
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
