use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Bid, Order, OrderItem},
    traits::{MarketplaceError, OrderManagement, OrderWithItems},
};

/// `OrderAssemblyApi` turns a cart or an accepted bid into a `Pending` order ready for checkout.
pub struct OrderAssemblyApi<B> {
    db: B,
}

impl<B> Debug for OrderAssemblyApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderAssemblyApi")
    }
}

impl<B> OrderAssemblyApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> OrderAssemblyApi<B>
where B: OrderManagement
{
    /// Snapshot the user's cart into a new `Pending` order.
    ///
    /// Each order item takes the cart's recorded unit price, not a live listing re-read, and the
    /// cart is cleared in the same transaction as the order insert. Fails on an empty cart.
    pub async fn order_from_cart(&self, user_id: i64) -> Result<OrderWithItems, MarketplaceError> {
        let result = self.db.order_from_cart(user_id).await?;
        debug!(
            "📦️ Order #{} assembled from cart for user {} ({} items, total {})",
            result.order.id,
            user_id,
            result.items.len(),
            result.order.total_price
        );
        Ok(result)
    }

    /// Fetch (or lazily create) the order backing an accepted bid.
    ///
    /// A bid that already carries an order reference reuses that order, which makes it safe for
    /// a buyer to hit "pay" again after an earlier attempt died between order creation and
    /// checkout-session creation.
    pub async fn order_for_bid(&self, bid_id: i64, buyer_id: i64) -> Result<(Order, Bid), MarketplaceError> {
        let (order, bid) = self.db.order_for_bid(bid_id, buyer_id).await?;
        debug!("📦️ Order #{} backs bid #{} (price {})", order.id, bid.id, bid.price);
        Ok((order, bid))
    }

    pub async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, MarketplaceError> {
        self.db.fetch_order(order_id).await
    }

    pub async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, MarketplaceError> {
        self.db.fetch_order_items(order_id).await
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
