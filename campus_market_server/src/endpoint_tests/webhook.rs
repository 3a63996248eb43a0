//! The webhook route's contract: convert, dispatch, and always answer 200 so the gateway never
//! retry-storms a payload that will not get better.
use actix_web::{http::StatusCode, web, web::ServiceConfig};
use campus_market_engine::{
    db_types::PaymentStatus,
    events::EventProducers,
    mkt_api::payment_objects::PaymentOutcome,
    traits::Settlement,
    SettlementApi,
};
use stripe_tools::{StripeApi, StripeConfig};

use super::{
    helpers::post_request,
    mocks::{sample_payment, MockPaymentReconciler},
};
use crate::webhook_routes::StripeWebhookRoute;

fn configure_with(mock: MockPaymentReconciler) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        let api = SettlementApi::new(mock, EventProducers::default());
        let stripe = StripeApi::new(StripeConfig::default()).expect("stripe client");
        cfg.app_data(web::Data::new(api))
            .app_data(web::Data::new(stripe))
            .service(StripeWebhookRoute::<MockPaymentReconciler>::new());
    }
}

fn webhook_body(event_type: &str, object: serde_json::Value) -> serde_json::Value {
    serde_json::json!({ "id": "evt_1", "type": event_type, "data": { "object": object } })
}

#[actix_web::test]
async fn unhandled_event_types_are_acknowledged() {
    let _ = env_logger::try_init().ok();
    // No expectations: touching the reconciler at all would fail the test.
    let mock = MockPaymentReconciler::new();
    let body = webhook_body("customer.created", serde_json::json!({ "id": "cus_1" }));
    let (status, body) = post_request(None, "/webhook/stripe", body, configure_with(mock)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("\"success\":true"), "unexpected body: {body}");
}

#[actix_web::test]
async fn malformed_events_are_logged_and_dropped_with_200() {
    let _ = env_logger::try_init().ok();
    let mock = MockPaymentReconciler::new();
    // A charge with no payment intent cannot be routed anywhere.
    let body = webhook_body(
        "charge.succeeded",
        serde_json::json!({ "id": "ch_1", "amount": 100, "currency": "usd", "status": "succeeded" }),
    );
    let (status, body) = post_request(None, "/webhook/stripe", body, configure_with(mock)).await;
    assert_eq!(status, StatusCode::OK, "malformed events must still be acknowledged");
    assert!(body.contains("\"success\":false"), "unexpected body: {body}");
}

#[actix_web::test]
async fn failure_events_reach_the_settlement_engine() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockPaymentReconciler::new();
    mock.expect_settle_payment().times(1).returning(|update, outcome| {
        assert_eq!(update.intent_id, "pi_1");
        assert_eq!(update.order_id, Some(7));
        assert_eq!(outcome, PaymentOutcome::Failed);
        Ok(Settlement::AlreadySettled(sample_payment(1, "pi_1", PaymentStatus::Failed)))
    });
    let body = webhook_body(
        "payment_intent.payment_failed",
        serde_json::json!({
            "id": "pi_1", "amount": 8500, "currency": "usd", "status": "requires_payment_method",
            "metadata": { "order_id": "7" },
            "last_payment_error": { "code": "card_declined", "message": "Your card was declined." }
        }),
    );
    let (status, body) = post_request(None, "/webhook/stripe", body, configure_with(mock)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("\"success\":true"), "unexpected body: {body}");
}

#[actix_web::test]
async fn intent_created_events_reconcile_without_settling() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockPaymentReconciler::new();
    mock.expect_reconcile_payment()
        .times(1)
        .returning(|update| Ok(sample_payment(1, &update.intent_id, PaymentStatus::Pending)));
    let body = webhook_body(
        "payment_intent.created",
        serde_json::json!({
            "id": "pi_9", "amount": 8500, "currency": "usd", "status": "requires_payment_method",
            "metadata": { "order_id": "7" }
        }),
    );
    let (status, body) = post_request(None, "/webhook/stripe", body, configure_with(mock)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("\"success\":true"), "unexpected body: {body}");
}
