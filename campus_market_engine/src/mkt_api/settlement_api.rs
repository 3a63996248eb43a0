use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Payment, PaymentUpdate},
    events::{EventProducers, OrderPaidEvent, PaymentFailedEvent},
    mkt_api::payment_objects::{GatewayEvent, PaymentOutcome},
    traits::{MarketplaceError, PaymentReconciliation, Settlement},
};

/// `SettlementApi` is the ingestion point for asynchronous gateway events.
///
/// It reconciles intent identifiers onto local payment records regardless of arrival order, and
/// applies terminal outcomes (order completion, stock decrement, bid resolution, listing
/// transitions) exactly once per payment. Duplicate and out-of-order deliveries are absorbed,
/// never errored, so the webhook route can always acknowledge.
pub struct SettlementApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for SettlementApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementApi")
    }
}

impl<B> SettlementApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> SettlementApi<B>
where B: PaymentReconciliation
{
    /// Dispatch a verified gateway event to the appropriate handler.
    ///
    /// Returns the settlement result for terminal events and `None` for purely informational
    /// ones. Callers that must never bounce an event (the webhook route) map errors to a logged
    /// acknowledgement.
    pub async fn process_event(&self, event: GatewayEvent) -> Result<Option<Settlement>, MarketplaceError> {
        trace!("🔄️ Processing {} event for intent [{}]", event.type_tag(), event.intent_id());
        match event {
            GatewayEvent::IntentCreated(update) | GatewayEvent::CheckoutCompleted(update) => {
                self.reconcile(update).await?;
                Ok(None)
            },
            GatewayEvent::IntentSucceeded(update) | GatewayEvent::ChargeSucceeded(update) => {
                self.on_payment_succeeded(update).await.map(Some)
            },
            GatewayEvent::IntentFailed(update) | GatewayEvent::ChargeFailed(update) => {
                self.on_payment_failed(update).await.map(Some)
            },
            GatewayEvent::ChargeUpdated(update) => {
                self.on_charge_updated(update).await?;
                Ok(None)
            },
        }
    }

    /// Converge this update onto exactly one payment record. See
    /// [`PaymentReconciliation::reconcile_payment`] for the merge rules.
    pub async fn reconcile(&self, update: PaymentUpdate) -> Result<Payment, MarketplaceError> {
        let payment = self.db.reconcile_payment(update).await?;
        trace!(
            "🔄️💰️ Payment {} reconciled for intent [{}] (order: {:?})",
            payment.id,
            payment.intent_id.as_deref().unwrap_or("-"),
            payment.order_id
        );
        Ok(payment)
    }

    /// Apply a successful payment outcome: payment → Completed, order → Completed, then either
    /// stock decrement (cart-sourced) or bid → Paid + listing → Sold (bid-sourced).
    pub async fn on_payment_succeeded(&self, update: PaymentUpdate) -> Result<Settlement, MarketplaceError> {
        let intent_id = update.intent_id.clone();
        let settlement = self.db.settle_payment(update, PaymentOutcome::Succeeded).await?;
        match &settlement {
            Settlement::Applied(outcome) => {
                info!("🔄️✅️ Intent [{intent_id}] settled. Order #{} is paid", outcome.order.id);
                let event = OrderPaidEvent {
                    order: outcome.order.clone(),
                    bid: outcome.bid.clone(),
                    seller_id: outcome.listing.as_ref().map(|l| l.seller_id),
                };
                for emitter in &self.producers.order_paid_producer {
                    emitter.publish_event(event.clone()).await;
                }
            },
            Settlement::AlreadySettled(p) => {
                debug!("🔄️✅️ Duplicate success event for intent [{intent_id}] ignored (payment {} is {})", p.id, p.status);
            },
            Settlement::Unmatched(p) => {
                warn!("🔄️✅️ Intent [{intent_id}] succeeded but payment {} has no order attached yet", p.id);
            },
        }
        Ok(settlement)
    }

    /// Apply a failed payment outcome: payment → Failed, order → Cancelled, and for bid-sourced
    /// orders the listing reverts to Active so the buyer can retry. The bid stays Accepted.
    pub async fn on_payment_failed(&self, update: PaymentUpdate) -> Result<Settlement, MarketplaceError> {
        let intent_id = update.intent_id.clone();
        let reason = update.failure_reason.clone().unwrap_or_else(|| "Unknown error".to_string());
        let settlement = self.db.settle_payment(update, PaymentOutcome::Failed).await?;
        match &settlement {
            Settlement::Applied(outcome) => {
                info!("🔄️❌️ Intent [{intent_id}] failed. Order #{} cancelled. {reason}", outcome.order.id);
                let event = PaymentFailedEvent {
                    order: outcome.order.clone(),
                    bid: outcome.bid.clone(),
                    seller_id: outcome.listing.as_ref().map(|l| l.seller_id),
                    reason: reason.clone(),
                };
                for emitter in &self.producers.payment_failed_producer {
                    emitter.publish_event(event.clone()).await;
                }
            },
            Settlement::AlreadySettled(p) => {
                debug!("🔄️❌️ Duplicate failure event for intent [{intent_id}] ignored (payment {} is {})", p.id, p.status);
            },
            Settlement::Unmatched(p) => {
                warn!("🔄️❌️ Intent [{intent_id}] failed but payment {} has no order attached yet", p.id);
            },
        }
        Ok(settlement)
    }

    /// Merge charge-level data (typically a receipt URL that arrived after the success event)
    /// without changing any status.
    pub async fn on_charge_updated(&self, update: PaymentUpdate) -> Result<Payment, MarketplaceError> {
        let payment = self.db.reconcile_payment(update).await?;
        trace!(
            "🔄️🧾️ Charge update merged onto payment {} (receipt: {})",
            payment.id,
            payment.receipt_url.as_deref().unwrap_or("none yet")
        );
        Ok(payment)
    }

    pub async fn payment_by_intent(&self, intent_id: &str) -> Result<Option<Payment>, MarketplaceError> {
        self.db.fetch_payment_by_intent(intent_id).await
    }

    pub async fn payment_for_order(&self, order_id: i64) -> Result<Option<Payment>, MarketplaceError> {
        self.db.fetch_payment_for_order(order_id).await
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
