use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

//--------------------------------------   CheckoutSession   ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// The hosted payment page. Present until the session completes.
    pub url: Option<String>,
    /// The payment intent minted for this session.
    pub payment_intent: Option<String>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

//--------------------------------------    PaymentIntent    ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    /// Amount in the currency's minor unit (cents for USD, whole yen for JPY).
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub latest_charge: Option<String>,
    pub last_payment_error: Option<LastPaymentError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastPaymentError {
    pub code: Option<String>,
    pub message: Option<String>,
}

//--------------------------------------        Charge       ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Charge {
    pub id: String,
    pub payment_intent: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub receipt_url: Option<String>,
    pub failure_message: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

//--------------------------------------     StripeEvent     ---------------------------------------------------------
/// The webhook event envelope. The payload object under `data.object` is kept as raw JSON and
/// parsed into a concrete type once the event type tag has been inspected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventData {
    pub object: Value,
}

impl StripeEvent {
    pub fn payment_intent(&self) -> Result<PaymentIntent, serde_json::Error> {
        serde_json::from_value(self.data.object.clone())
    }

    pub fn charge(&self) -> Result<Charge, serde_json::Error> {
        serde_json::from_value(self.data.object.clone())
    }

    pub fn checkout_session(&self) -> Result<CheckoutSession, serde_json::Error> {
        serde_json::from_value(self.data.object.clone())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn event_envelope_round_trip() {
        let raw = serde_json::json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": { "object": {
                "id": "pi_123",
                "amount": 8500,
                "currency": "usd",
                "status": "succeeded",
                "description": "Campus market order [order:7]",
                "metadata": { "order_id": "7" },
                "latest_charge": "ch_9",
                "last_payment_error": null
            }}
        });
        let event: StripeEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(event.event_type, "payment_intent.succeeded");
        let intent = event.payment_intent().unwrap();
        assert_eq!(intent.id, "pi_123");
        assert_eq!(intent.amount, 8500);
        assert_eq!(intent.metadata.get("order_id").map(String::as_str), Some("7"));
    }

    #[test]
    fn charge_parses_without_optional_fields() {
        let raw = serde_json::json!({
            "id": "ch_1", "payment_intent": "pi_1", "amount": 100, "currency": "usd", "status": "succeeded"
        });
        let charge: Charge = serde_json::from_value(raw).unwrap();
        assert!(charge.receipt_url.is_none());
        assert!(charge.metadata.is_empty());
    }
}
