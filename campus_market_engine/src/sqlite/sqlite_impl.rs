//! `SqliteDatabase` is the concrete SQLite backend for the campus market engine.
//!
//! It implements the trait family from [`crate::traits`]. Every multi-step mutation runs inside
//! a single transaction obtained from the pool, with its validation performed under that same
//! transaction, which is what makes the cascades and the settlement idempotency gate safe under
//! concurrent webhook deliveries and API calls.
use std::fmt::Debug;

use chrono::Duration;
use cmp_common::{Money, MARKET_CURRENCY_CODE};
use log::*;
use sqlx::{SqliteConnection, SqlitePool};

use super::db::{self, bids, carts, listings, orders, payments};
use crate::{
    db_types::{Bid, BidStatus, Listing, ListingStatus, NewBid, Order, OrderItem, OrderStatus, Payment, PaymentUpdate},
    mkt_api::payment_objects::PaymentOutcome,
    traits::{
        BidAcceptance,
        BidManagement,
        CounterOutcome,
        MarketplaceDatabase,
        MarketplaceError,
        OrderManagement,
        OrderWithItems,
        PaymentReconciliation,
        Settlement,
        SettlementOutcome,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, MarketplaceError> {
        let pool = db::new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// The acceptance cascade, applied under the caller's transaction. The listing must still be
/// `Active`; of two racing accepts, the one that loses the status guard gets
/// [`MarketplaceError::ListingUnavailable`] and none of its effects are applied.
async fn apply_acceptance(
    bid: Bid,
    listing: Listing,
    conn: &mut SqliteConnection,
) -> Result<BidAcceptance, MarketplaceError> {
    let reserved = listings::deactivate_for_bid_sale(listing.id, conn).await?;
    if !reserved {
        return Err(MarketplaceError::ListingUnavailable(listing.id));
    }
    let accepted = bids::update_bid_status(bid.id, BidStatus::Accepted, conn).await?;
    let rejected = bids::reject_open_bids_except(listing.id, bid.id, conn).await?;
    let order = orders::insert_order(bid.buyer_id, bid.price, conn).await?;
    orders::insert_order_item(order.id, listing.id, 1, bid.price, conn).await?;
    let accepted = bids::link_order(accepted.id, order.id, conn).await?;
    let listing =
        listings::fetch_listing(listing.id, conn).await?.ok_or(MarketplaceError::ListingNotFound(listing.id))?;
    Ok(BidAcceptance { accepted, rejected, listing, order })
}

/// The reconciliation merge, shared between `reconcile_payment` and the settlement fallback path.
/// See [`PaymentReconciliation::reconcile_payment`] for the lookup and merge rules.
async fn reconcile_in_tx(update: &PaymentUpdate, conn: &mut SqliteConnection) -> Result<Payment, MarketplaceError> {
    if let Some(existing) = payments::fetch_by_intent(&update.intent_id, conn).await? {
        return payments::merge_onto(existing.id, update.order_id, update.receipt_url.as_deref(), conn).await;
    }
    if let Some(order_id) = update.order_id {
        if let Some(existing) = payments::fetch_by_order(order_id, conn).await? {
            // The intent id changes when a buyer abandons a checkout session and retries.
            let adopted = payments::adopt_intent(existing.id, &update.intent_id, conn).await?;
            return payments::merge_onto(adopted.id, None, update.receipt_url.as_deref(), conn).await;
        }
    }
    let currency = update.currency.clone().unwrap_or_else(|| MARKET_CURRENCY_CODE.to_string());
    match payments::insert_pending(
        &update.intent_id,
        update.order_id,
        update.amount,
        &currency,
        update.receipt_url.as_deref(),
        conn,
    )
    .await
    {
        Ok(payment) => Ok(payment),
        Err(e) if is_unique_violation(&e) => Err(MarketplaceError::PaymentCollision(update.intent_id.clone())),
        Err(e) => Err(e.into()),
    }
}

/// The full terminal settlement, applied under the caller's transaction. The idempotency gate
/// (load current status, compare, conditionally apply) runs here, under the same transaction as
/// every write, so a duplicate delivery can never double-apply side effects.
async fn settle_in_tx(
    update: &PaymentUpdate,
    outcome: PaymentOutcome,
    conn: &mut SqliteConnection,
) -> Result<Settlement, MarketplaceError> {
    let target = outcome.payment_status();
    let payment = match payments::fetch_by_intent(&update.intent_id, conn).await? {
        Some(p) => p,
        // The terminal webhook can outrun the synchronous path's own record creation.
        None => reconcile_in_tx(update, conn).await?,
    };
    if payment.status == target {
        return Ok(Settlement::AlreadySettled(payment));
    }
    if payment.status.is_terminal() {
        warn!(
            "🗃️ Intent [{}] delivered '{outcome}' but payment {} is already {}. Ignoring.",
            update.intent_id, payment.id, payment.status
        );
        return Ok(Settlement::AlreadySettled(payment));
    }
    // Merge any linkage this event carries (it may be the first to know the order id).
    let payment = payments::merge_onto(payment.id, update.order_id, update.receipt_url.as_deref(), conn).await?;
    let reason = match outcome {
        PaymentOutcome::Failed => Some(update.failure_reason.clone().unwrap_or_else(|| "Unknown error".to_string())),
        PaymentOutcome::Succeeded => None,
    };
    let payment = payments::set_terminal_status(payment.id, target, reason.as_deref(), None, conn).await?;
    let Some(order_id) = payment.order_id else {
        return Ok(Settlement::Unmatched(payment));
    };
    let order_status = match outcome {
        PaymentOutcome::Succeeded => OrderStatus::Completed,
        PaymentOutcome::Failed => OrderStatus::Cancelled,
    };
    let order = match orders::transition_from_pending(order_id, order_status, conn).await? {
        Some(order) => order,
        None => {
            // The order already left Pending (e.g. a different intent for the same order
            // settled first), so its side effects were already applied exactly once.
            debug!("🗃️ Order #{order_id} already settled; treating intent [{}] as a no-op", update.intent_id);
            return Ok(Settlement::AlreadySettled(payment));
        },
    };
    let bid = bids::fetch_bid_for_order(order_id, conn).await?;
    let mut settled_bid = None;
    let mut listing_after = None;
    let mut sold_out = Vec::new();
    match (outcome, bid) {
        (PaymentOutcome::Succeeded, Some(bid)) => {
            // Bid purchases are single-unit: the listing sells outright.
            let paid = bids::update_bid_status(bid.id, BidStatus::Paid, conn).await?;
            let listing = listings::update_status(bid.listing_id, ListingStatus::Sold, conn).await?;
            settled_bid = Some(paid);
            listing_after = Some(listing);
        },
        (PaymentOutcome::Succeeded, None) => {
            let items = orders::fetch_order_items(order_id, conn).await?;
            for item in &items {
                let listing = listings::decrement_stock(item.listing_id, item.quantity, conn).await?;
                if listing.quantity == 0 && listing.status != ListingStatus::Sold {
                    listings::update_status(listing.id, ListingStatus::Sold, conn).await?;
                    sold_out.push(listing.id);
                }
            }
        },
        (PaymentOutcome::Failed, Some(bid)) => {
            // The bid stays Accepted so the buyer can retry; only the listing reverts.
            match listings::reactivate_after_failed_sale(bid.listing_id, conn).await? {
                Some(listing) => listing_after = Some(listing),
                None => {
                    warn!(
                        "🗃️ Listing [{}] was not Inactive while failing bid #{}; leaving it untouched",
                        bid.listing_id, bid.id
                    );
                    listing_after = listings::fetch_listing(bid.listing_id, conn).await?;
                },
            }
            settled_bid = Some(bid);
        },
        (PaymentOutcome::Failed, None) => {},
    }
    Ok(Settlement::Applied(SettlementOutcome { payment, order, bid: settled_bid, listing: listing_after, sold_out }))
}

impl BidManagement for SqliteDatabase {
    async fn insert_bid(&self, bid: NewBid) -> Result<(Bid, Listing), MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let listing = listings::fetch_listing(bid.listing_id, &mut tx)
            .await?
            .ok_or(MarketplaceError::ListingNotFound(bid.listing_id))?;
        if !listing.is_biddable() {
            return Err(MarketplaceError::BiddingClosed(listing.id));
        }
        if bid.buyer_id == listing.seller_id {
            return Err(MarketplaceError::SelfBid(listing.id));
        }
        if let Some(floor) = listing.floor_price {
            if bid.price < floor {
                return Err(MarketplaceError::BidBelowFloor { offered: bid.price, floor });
            }
        }
        let bid = bids::insert_bid(bid, BidStatus::Pending, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Bid #{} saved on listing [{}]", bid.id, listing.id);
        Ok((bid, listing))
    }

    async fn fetch_bid(&self, bid_id: i64) -> Result<Option<Bid>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(bids::fetch_bid(bid_id, &mut conn).await?)
    }

    async fn fetch_listing(&self, listing_id: i64) -> Result<Option<Listing>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(listings::fetch_listing(listing_id, &mut conn).await?)
    }

    async fn counter_bid(
        &self,
        bid_id: i64,
        actor: i64,
        price: Money,
        terms: Option<String>,
    ) -> Result<CounterOutcome, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let original = bids::fetch_bid(bid_id, &mut tx).await?.ok_or(MarketplaceError::BidNotFound(bid_id))?;
        let listing = listings::fetch_listing(original.listing_id, &mut tx)
            .await?
            .ok_or(MarketplaceError::ListingNotFound(original.listing_id))?;
        if listing.seller_id != actor {
            return Err(MarketplaceError::NotListingSeller { actor, listing_id: listing.id });
        }
        if !original.status.is_open() {
            return Err(MarketplaceError::BidNotOpen { bid_id, status: original.status });
        }
        let original = bids::update_bid_status(original.id, BidStatus::Countered, &mut tx).await?;
        let counter = NewBid { listing_id: original.listing_id, buyer_id: original.buyer_id, price, terms };
        let counter = bids::insert_bid(counter, BidStatus::Countered, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Bid #{} countered by seller {actor}; counter-offer saved as bid #{}", original.id, counter.id);
        Ok(CounterOutcome { original, counter, listing })
    }

    async fn accept_bid(&self, bid_id: i64, actor: i64) -> Result<BidAcceptance, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let bid = bids::fetch_bid(bid_id, &mut tx).await?.ok_or(MarketplaceError::BidNotFound(bid_id))?;
        if !bid.status.is_open() {
            return Err(MarketplaceError::BidNotOpen { bid_id, status: bid.status });
        }
        let listing = listings::fetch_listing(bid.listing_id, &mut tx)
            .await?
            .ok_or(MarketplaceError::ListingNotFound(bid.listing_id))?;
        if listing.seller_id != actor {
            return Err(MarketplaceError::NotListingSeller { actor, listing_id: listing.id });
        }
        let acceptance = apply_acceptance(bid, listing, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🗃️ Bid #{} accepted; {} competitors rejected; listing [{}] parked; order #{} created",
            acceptance.accepted.id,
            acceptance.rejected.len(),
            acceptance.listing.id,
            acceptance.order.id
        );
        Ok(acceptance)
    }

    async fn finalize_highest_bid(&self, listing_id: i64, actor: i64) -> Result<BidAcceptance, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let listing =
            listings::fetch_listing(listing_id, &mut tx).await?.ok_or(MarketplaceError::ListingNotFound(listing_id))?;
        if listing.seller_id != actor {
            return Err(MarketplaceError::NotListingSeller { actor, listing_id });
        }
        let winner =
            bids::highest_pending_bid(listing_id, &mut tx).await?.ok_or(MarketplaceError::NoOpenBids(listing_id))?;
        let acceptance = apply_acceptance(winner, listing, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🗃️ Bidding finalized on listing [{listing_id}]: bid #{} wins at {}",
            acceptance.accepted.id, acceptance.accepted.price
        );
        Ok(acceptance)
    }

    async fn reject_bid(&self, bid_id: i64, actor: i64) -> Result<Bid, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let bid = bids::fetch_bid(bid_id, &mut tx).await?.ok_or(MarketplaceError::BidNotFound(bid_id))?;
        let listing = listings::fetch_listing(bid.listing_id, &mut tx)
            .await?
            .ok_or(MarketplaceError::ListingNotFound(bid.listing_id))?;
        if listing.seller_id != actor {
            return Err(MarketplaceError::NotListingSeller { actor, listing_id: listing.id });
        }
        if !bid.status.is_open() {
            return Err(MarketplaceError::BidNotOpen { bid_id, status: bid.status });
        }
        let bid = bids::update_bid_status(bid.id, BidStatus::Rejected, &mut tx).await?;
        tx.commit().await?;
        Ok(bid)
    }

    async fn mark_bid_countered(&self, bid_id: i64, actor: i64) -> Result<Bid, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let bid = bids::fetch_bid(bid_id, &mut tx).await?.ok_or(MarketplaceError::BidNotFound(bid_id))?;
        let listing = listings::fetch_listing(bid.listing_id, &mut tx)
            .await?
            .ok_or(MarketplaceError::ListingNotFound(bid.listing_id))?;
        if listing.seller_id != actor {
            return Err(MarketplaceError::NotListingSeller { actor, listing_id: listing.id });
        }
        if bid.status != BidStatus::Pending {
            return Err(MarketplaceError::InvalidBidTransition { from: bid.status, to: BidStatus::Countered });
        }
        let bid = bids::update_bid_status(bid.id, BidStatus::Countered, &mut tx).await?;
        tx.commit().await?;
        Ok(bid)
    }

    async fn expire_stale_bids(&self, older_than: Duration) -> Result<Vec<Bid>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let expired = bids::expire_stale(older_than, &mut conn).await?;
        Ok(expired)
    }

    async fn fetch_bids_for_listing(&self, listing_id: i64) -> Result<Vec<Bid>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(bids::bids_for_listing(listing_id, &mut conn).await?)
    }

    async fn fetch_bids_for_user(&self, buyer_id: i64) -> Result<Vec<Bid>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(bids::bids_for_user(buyer_id, &mut conn).await?)
    }

    async fn active_bid_count(&self, listing_id: i64) -> Result<i64, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(bids::active_bid_count(listing_id, &mut conn).await?)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn order_from_cart(&self, user_id: i64) -> Result<OrderWithItems, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let cart = carts::cart_items_for_user(user_id, &mut tx).await?;
        if cart.is_empty() {
            return Err(MarketplaceError::EmptyCart(user_id));
        }
        let total: Money = cart.iter().map(|line| line.unit_price * line.quantity).sum();
        let order = orders::insert_order(user_id, total, &mut tx).await?;
        let mut items = Vec::with_capacity(cart.len());
        for line in &cart {
            let item =
                orders::insert_order_item(order.id, line.listing_id, line.quantity, line.unit_price, &mut tx).await?;
            items.push(item);
        }
        carts::clear_cart(user_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Cart for user {user_id} converted into order #{} ({} lines, {total})", order.id, items.len());
        Ok(OrderWithItems { order, items })
    }

    async fn order_for_bid(&self, bid_id: i64, buyer_id: i64) -> Result<(Order, Bid), MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let bid = bids::fetch_bid(bid_id, &mut tx).await?.ok_or(MarketplaceError::BidNotFound(bid_id))?;
        if bid.buyer_id != buyer_id {
            return Err(MarketplaceError::NotBidOwner { actor: buyer_id, bid_id });
        }
        // Idempotent re-entry: a bid that already carries an order reuses it.
        if let Some(order_id) = bid.order_id {
            let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(MarketplaceError::OrderNotFound(order_id))?;
            tx.commit().await?;
            return Ok((order, bid));
        }
        if bid.status != BidStatus::Accepted {
            return Err(MarketplaceError::BidNotAccepted { bid_id, status: bid.status });
        }
        let order = orders::insert_order(bid.buyer_id, bid.price, &mut tx).await?;
        orders::insert_order_item(order.id, bid.listing_id, 1, bid.price, &mut tx).await?;
        let bid = bids::link_order(bid.id, order.id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order #{} created for accepted bid #{}", order.id, bid.id);
        Ok((order, bid))
    }

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order(order_id, &mut conn).await?)
    }

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_items(order_id, &mut conn).await?)
    }
}

impl PaymentReconciliation for SqliteDatabase {
    async fn reconcile_payment(&self, update: PaymentUpdate) -> Result<Payment, MarketplaceError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let mut tx = self.pool.begin().await?;
            match reconcile_in_tx(&update, &mut tx).await {
                Ok(payment) => {
                    tx.commit().await?;
                    return Ok(payment);
                },
                Err(MarketplaceError::PaymentCollision(intent)) if attempts < 2 => {
                    // A racing creator inserted the row between our lookup and our insert. The
                    // retry's lookup will now find it and merge instead.
                    debug!("🗃️ Lost payment creation race for intent [{intent}]; retrying as a merge");
                    drop(tx);
                },
                Err(e) => return Err(e),
            }
        }
    }

    async fn settle_payment(
        &self,
        update: PaymentUpdate,
        outcome: PaymentOutcome,
    ) -> Result<Settlement, MarketplaceError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let mut tx = self.pool.begin().await?;
            match settle_in_tx(&update, outcome, &mut tx).await {
                Ok(settlement) => {
                    tx.commit().await?;
                    if let Settlement::Applied(applied) = &settlement {
                        info!(
                            "🗃️ Intent [{}] settled as {outcome}: payment {} → {}, order #{} → {}",
                            update.intent_id,
                            applied.payment.id,
                            applied.payment.status,
                            applied.order.id,
                            applied.order.status
                        );
                    }
                    return Ok(settlement);
                },
                Err(MarketplaceError::PaymentCollision(intent)) if attempts < 2 => {
                    debug!("🗃️ Lost the fallback creation race for intent [{intent}]; retrying settlement");
                    drop(tx);
                },
                Err(e) => return Err(e),
            }
        }
    }

    async fn attach_receipt(&self, intent_id: &str, receipt_url: &str) -> Result<Option<Payment>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::attach_receipt(intent_id, receipt_url, &mut conn).await?)
    }

    async fn fetch_payment_by_intent(&self, intent_id: &str) -> Result<Option<Payment>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_by_intent(intent_id, &mut conn).await?)
    }

    async fn fetch_payment_for_order(&self, order_id: i64) -> Result<Option<Payment>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_by_order(order_id, &mut conn).await?)
    }
}

impl MarketplaceDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn close(&mut self) -> Result<(), MarketplaceError> {
        self.pool.close().await;
        Ok(())
    }
}
