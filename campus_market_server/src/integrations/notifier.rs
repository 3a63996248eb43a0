//! The notification sink and the event hooks that feed it.
//!
//! Notifications are strictly fire-and-forget: they run on the event handler's own tasks, after
//! the originating transaction has committed, with a bounded timeout, and every failure is
//! swallowed with a log line. Nothing in the bid or settlement flows ever waits on this module.
use std::time::Duration;

use campus_market_engine::events::{EventHandlers, EventHooks};
use log::*;
use reqwest::Client;
use serde_json::json;

use crate::integrations::identity::IdentityApi;

pub const NOTIFICATION_EVENT_BUFFER_SIZE: usize = 25;
const NOTIFIER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct Notifier {
    client: Client,
    url: Option<String>,
}

impl Notifier {
    pub fn new(url: Option<String>) -> Self {
        Self { client: Client::new(), url }
    }

    /// Deliver one user-facing message, best-effort. Without a configured sink the message is
    /// logged and dropped.
    pub async fn send(&self, user_id: i64, category: &str, text: String) {
        let Some(url) = &self.url else {
            info!("📣️ [{category}] → user {user_id}: {text}");
            return;
        };
        let body = json!({ "user_id": user_id, "category": category, "text": text });
        match self.client.post(url).timeout(NOTIFIER_TIMEOUT).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => trace!("📣️ [{category}] delivered to user {user_id}"),
            Ok(resp) => warn!("📣️ Notification sink returned {} for user {user_id}. Dropping.", resp.status()),
            Err(e) => warn!("📣️ Could not deliver [{category}] notification to user {user_id}: {e}. Dropping."),
        }
    }
}

/// Wires every engine event the marketplace cares about to the notification sink.
///
/// Each closure clones its clients and returns a boxed future; the engine's event handler runs
/// them on their own tasks, so a slow sink can never hold up a settlement or an acceptance.
pub fn create_notification_event_handlers(notifier: Notifier, identity: IdentityApi) -> EventHandlers {
    let mut hooks = EventHooks::default();

    // --- Bid placed: tell the seller ---
    let n = notifier.clone();
    let id_api = identity.clone();
    hooks.on_bid_placed(move |ev| {
        let n = n.clone();
        let id_api = id_api.clone();
        Box::pin(async move {
            let buyer = id_api.display_name(ev.bid.buyer_id).await;
            let text = format!("{buyer} offered {} for \"{}\".", ev.bid.price, ev.listing.title);
            n.send(ev.listing.seller_id, "bid_placed", text).await;
        })
    });

    // --- Bid countered: tell the buyer ---
    let n = notifier.clone();
    hooks.on_bid_countered(move |ev| {
        let n = n.clone();
        Box::pin(async move {
            let text = format!(
                "The seller countered your offer of {} with {}. You can accept, let it expire, or wait for a better \
                 deal.",
                ev.original.price, ev.counter.price
            );
            n.send(ev.counter.buyer_id, "bid_countered", text).await;
        })
    });

    // --- Bid rejected: tell the buyer ---
    let n = notifier.clone();
    hooks.on_bid_rejected(move |ev| {
        let n = n.clone();
        Box::pin(async move {
            let text = format!("Your offer of {} was declined.", ev.bid.price);
            n.send(ev.bid.buyer_id, "bid_rejected", text).await;
        })
    });

    // --- Bid accepted: tell the buyer to pay ---
    let n = notifier.clone();
    hooks.on_bid_accepted(move |ev| {
        let n = n.clone();
        Box::pin(async move {
            let text = format!(
                "Your offer of {} was accepted! Complete payment on order #{} to claim the item.",
                ev.bid.price, ev.order.id
            );
            n.send(ev.bid.buyer_id, "bid_accepted", text).await;
        })
    });

    // --- Order paid: tell the buyer, and the seller for bid sales ---
    let n = notifier.clone();
    hooks.on_order_paid(move |ev| {
        let n = n.clone();
        Box::pin(async move {
            let text = format!("Payment received for order #{} ({}). You're all set!", ev.order.id, ev.order.total_price);
            n.send(ev.order.user_id, "order_paid", text).await;
            if let (Some(bid), Some(seller_id)) = (&ev.bid, ev.seller_id) {
                let text = format!("Your item sold for {}. Arrange the hand-over with the buyer.", bid.price);
                n.send(seller_id, "item_sold", text).await;
            }
        })
    });

    // --- Payment failed: tell the buyer, and the seller for bid sales ---
    let n = notifier;
    hooks.on_payment_failed(move |ev| {
        let n = n.clone();
        Box::pin(async move {
            let text = format!("Payment for order #{} failed: {}. You can try again.", ev.order.id, ev.reason);
            n.send(ev.order.user_id, "payment_failed", text).await;
            if let (Some(bid), Some(seller_id)) = (&ev.bid, ev.seller_id) {
                let text = format!(
                    "The buyer's payment of {} fell through; your listing is live and biddable again.",
                    bid.price
                );
                n.send(seller_id, "payment_failed", text).await;
            }
        })
    });

    EventHandlers::new(NOTIFICATION_EVENT_BUFFER_SIZE, hooks)
}
