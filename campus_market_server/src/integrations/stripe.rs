//! Conversion of Stripe webhook payloads into the engine's gateway event model.
//!
//! Order routing works on two channels: the `order_id` metadata key that our own checkout
//! sessions stamp onto every intent, and, as a fallback, the `[order:<id>]` label embedded in
//! the free-text description. An event that carries neither still converts; the settlement
//! engine can often route it via the payment record's existing order linkage.
use campus_market_engine::{db_types::PaymentUpdate, helpers::extract_order_id_from_label, GatewayEvent};
use stripe_tools::{
    data_objects::{Charge, CheckoutSession, PaymentIntent},
    helpers::money_from_minor_units,
    StripeEvent,
};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum EventConversionError {
    #[error("Event type {0} is not handled by this server")]
    UnhandledType(String),
    #[error("The event payload is malformed. {0}")]
    Malformed(String),
}

pub fn gateway_event_from_stripe(event: &StripeEvent) -> Result<GatewayEvent, EventConversionError> {
    match event.event_type.as_str() {
        "payment_intent.created" => intent_update(event).map(GatewayEvent::IntentCreated),
        "payment_intent.succeeded" => intent_update(event).map(GatewayEvent::IntentSucceeded),
        "payment_intent.payment_failed" => intent_update(event).map(GatewayEvent::IntentFailed),
        "charge.succeeded" => charge_update(event).map(GatewayEvent::ChargeSucceeded),
        "charge.updated" => charge_update(event).map(GatewayEvent::ChargeUpdated),
        "charge.failed" => charge_update(event).map(GatewayEvent::ChargeFailed),
        "checkout.session.completed" => session_update(event).map(GatewayEvent::CheckoutCompleted),
        other => Err(EventConversionError::UnhandledType(other.to_string())),
    }
}

fn order_id_from(metadata: Option<&String>, description: Option<&str>) -> Option<i64> {
    metadata.and_then(|s| s.parse::<i64>().ok()).or_else(|| description.and_then(extract_order_id_from_label))
}

fn intent_update(event: &StripeEvent) -> Result<PaymentUpdate, EventConversionError> {
    let intent: PaymentIntent =
        event.payment_intent().map_err(|e| EventConversionError::Malformed(e.to_string()))?;
    let order_id = order_id_from(intent.metadata.get("order_id"), intent.description.as_deref());
    Ok(PaymentUpdate {
        order_id,
        amount: money_from_minor_units(intent.amount, &intent.currency),
        currency: Some(intent.currency.to_uppercase()),
        receipt_url: None,
        failure_reason: intent.last_payment_error.and_then(|e| e.message),
        intent_id: intent.id,
    })
}

fn charge_update(event: &StripeEvent) -> Result<PaymentUpdate, EventConversionError> {
    let charge: Charge = event.charge().map_err(|e| EventConversionError::Malformed(e.to_string()))?;
    let intent_id = charge
        .payment_intent
        .ok_or_else(|| EventConversionError::Malformed(format!("Charge {} has no payment intent", charge.id)))?;
    let order_id = order_id_from(charge.metadata.get("order_id"), charge.description.as_deref());
    Ok(PaymentUpdate {
        intent_id,
        order_id,
        amount: money_from_minor_units(charge.amount, &charge.currency),
        currency: Some(charge.currency.to_uppercase()),
        receipt_url: charge.receipt_url,
        failure_reason: charge.failure_message,
    })
}

fn session_update(event: &StripeEvent) -> Result<PaymentUpdate, EventConversionError> {
    let session: CheckoutSession =
        event.checkout_session().map_err(|e| EventConversionError::Malformed(e.to_string()))?;
    let intent_id = session
        .payment_intent
        .ok_or_else(|| EventConversionError::Malformed(format!("Session {} has no payment intent", session.id)))?;
    let order_id = session.metadata.get("order_id").and_then(|s| s.parse::<i64>().ok());
    let currency = session.currency.as_deref().unwrap_or_default();
    Ok(PaymentUpdate {
        intent_id,
        order_id,
        amount: money_from_minor_units(session.amount_total.unwrap_or_default(), currency),
        currency: session.currency.as_ref().map(|c| c.to_uppercase()),
        receipt_url: None,
        failure_reason: None,
    })
}

#[cfg(test)]
mod test {
    use cmp_common::Money;

    use super::*;

    fn event(event_type: &str, object: serde_json::Value) -> StripeEvent {
        serde_json::from_value(serde_json::json!({
            "id": "evt_1",
            "type": event_type,
            "data": { "object": object }
        }))
        .unwrap()
    }

    #[test]
    fn intent_events_route_by_metadata() {
        let ev = event(
            "payment_intent.succeeded",
            serde_json::json!({
                "id": "pi_1", "amount": 8500, "currency": "usd", "status": "succeeded",
                "metadata": { "order_id": "7" }
            }),
        );
        let Ok(GatewayEvent::IntentSucceeded(update)) = gateway_event_from_stripe(&ev) else {
            panic!("wrong variant");
        };
        assert_eq!(update.intent_id, "pi_1");
        assert_eq!(update.order_id, Some(7));
        assert_eq!(update.amount, Money::from_dollars(85));
        assert_eq!(update.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn intent_events_fall_back_to_the_description_label() {
        let ev = event(
            "payment_intent.payment_failed",
            serde_json::json!({
                "id": "pi_2", "amount": 5000, "currency": "usd", "status": "requires_payment_method",
                "description": "Campus market order [order:42]",
                "last_payment_error": { "code": "card_declined", "message": "Your card was declined." }
            }),
        );
        let Ok(GatewayEvent::IntentFailed(update)) = gateway_event_from_stripe(&ev) else {
            panic!("wrong variant");
        };
        assert_eq!(update.order_id, Some(42));
        assert_eq!(update.failure_reason.as_deref(), Some("Your card was declined."));
    }

    #[test]
    fn unroutable_intents_still_convert() {
        let ev = event(
            "payment_intent.succeeded",
            serde_json::json!({
                "id": "pi_3", "amount": 100, "currency": "usd", "status": "succeeded",
                "description": "A payment from some other system"
            }),
        );
        let Ok(GatewayEvent::IntentSucceeded(update)) = gateway_event_from_stripe(&ev) else {
            panic!("wrong variant");
        };
        assert_eq!(update.order_id, None);
    }

    #[test]
    fn charges_carry_receipts() {
        let ev = event(
            "charge.updated",
            serde_json::json!({
                "id": "ch_1", "payment_intent": "pi_1", "amount": 8500, "currency": "usd",
                "status": "succeeded", "receipt_url": "https://r/1"
            }),
        );
        let Ok(GatewayEvent::ChargeUpdated(update)) = gateway_event_from_stripe(&ev) else {
            panic!("wrong variant");
        };
        assert_eq!(update.receipt_url.as_deref(), Some("https://r/1"));
    }

    #[test]
    fn charges_without_an_intent_are_malformed() {
        let ev = event(
            "charge.succeeded",
            serde_json::json!({ "id": "ch_2", "amount": 100, "currency": "usd", "status": "succeeded" }),
        );
        assert!(matches!(gateway_event_from_stripe(&ev), Err(EventConversionError::Malformed(_))));
    }

    #[test]
    fn unknown_event_types_are_reported_as_unhandled() {
        let ev = event("customer.created", serde_json::json!({ "id": "cus_1" }));
        assert!(matches!(gateway_event_from_stripe(&ev), Err(EventConversionError::UnhandledType(_))));
    }

    #[test]
    fn zero_decimal_currencies_scale_correctly() {
        let ev = event(
            "payment_intent.succeeded",
            serde_json::json!({ "id": "pi_4", "amount": 850, "currency": "jpy", "status": "succeeded" }),
        );
        let Ok(GatewayEvent::IntentSucceeded(update)) = gateway_event_from_stripe(&ev) else {
            panic!("wrong variant");
        };
        assert_eq!(update.amount, Money::from_cents(85_000));
    }
}
