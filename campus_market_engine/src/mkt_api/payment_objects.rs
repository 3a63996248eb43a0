use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::db_types::{PaymentStatus, PaymentUpdate};

/// The terminal verdict implied by a gateway event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
}

impl PaymentOutcome {
    /// The payment status this outcome settles to.
    pub fn payment_status(&self) -> PaymentStatus {
        match self {
            PaymentOutcome::Succeeded => PaymentStatus::Completed,
            PaymentOutcome::Failed => PaymentStatus::Failed,
        }
    }
}

impl Display for PaymentOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentOutcome::Succeeded => write!(f, "succeeded"),
            PaymentOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// A verified, deserialised gateway event, reduced to the closed set of types the settlement
/// engine routes on. Transport framing and signature checks happen upstream; by the time an
/// event is here it only carries reconciliation data.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    IntentCreated(PaymentUpdate),
    IntentSucceeded(PaymentUpdate),
    IntentFailed(PaymentUpdate),
    ChargeSucceeded(PaymentUpdate),
    ChargeUpdated(PaymentUpdate),
    ChargeFailed(PaymentUpdate),
    CheckoutCompleted(PaymentUpdate),
}

impl GatewayEvent {
    pub fn intent_id(&self) -> &str {
        match self {
            GatewayEvent::IntentCreated(u)
            | GatewayEvent::IntentSucceeded(u)
            | GatewayEvent::IntentFailed(u)
            | GatewayEvent::ChargeSucceeded(u)
            | GatewayEvent::ChargeUpdated(u)
            | GatewayEvent::ChargeFailed(u)
            | GatewayEvent::CheckoutCompleted(u) => &u.intent_id,
        }
    }

    pub fn type_tag(&self) -> &'static str {
        match self {
            GatewayEvent::IntentCreated(_) => "intent-created",
            GatewayEvent::IntentSucceeded(_) => "intent-succeeded",
            GatewayEvent::IntentFailed(_) => "intent-failed",
            GatewayEvent::ChargeSucceeded(_) => "charge-succeeded",
            GatewayEvent::ChargeUpdated(_) => "charge-updated",
            GatewayEvent::ChargeFailed(_) => "charge-failed",
            GatewayEvent::CheckoutCompleted(_) => "checkout-session-completed",
        }
    }
}
