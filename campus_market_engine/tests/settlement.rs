mod helpers;

use campus_market_engine::{
    db_types::{BidStatus, ListingStatus, NewBid, OrderStatus, PaymentStatus, PaymentUpdate},
    events::EventProducers,
    test_utils::seed::{seed_cart_item, seed_listing, ListingSeed},
    BidFlowApi,
    GatewayEvent,
    MarketplaceError,
    OrderAssemblyApi,
    SettlementApi,
    SqliteDatabase,
};
use campus_market_engine::{
    traits::{BidAcceptance, Settlement},
    BidManagement,
};
use cmp_common::Money;
use helpers::new_test_db;

const SELLER: i64 = 1;
const BUYER: i64 = 2;

async fn payment_row_count(db: &SqliteDatabase) -> i64 {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM payments").fetch_one(db.pool()).await.unwrap();
    count.0
}

async fn accept_a_bid(db: &SqliteDatabase, price: Money) -> BidAcceptance {
    let listing = seed_listing(db, ListingSeed::default()).await;
    let bids = BidFlowApi::new(db.clone(), EventProducers::default());
    let bid = bids.place_bid(NewBid::new(listing.id, BUYER, price)).await.unwrap();
    bids.accept_bid(bid.id, SELLER).await.unwrap()
}

//-------------------------------------- Reconciler ------------------------------------------------------------------

#[tokio::test]
async fn reconciler_merge_is_order_independent() {
    let db = new_test_db().await;
    let api = SettlementApi::new(db.clone(), EventProducers::default());
    let acceptance = accept_a_bid(&db, Money::from_dollars(85)).await;
    let order_id = acceptance.order.id;

    // Intent first, order id later.
    let p1 = api.reconcile(PaymentUpdate::new("pi_X", Money::from_dollars(85))).await.unwrap();
    assert_eq!(p1.order_id, None);
    let p2 = api.reconcile(PaymentUpdate::new("pi_X", Money::from_dollars(85)).for_order(order_id)).await.unwrap();
    assert_eq!(p2.id, p1.id, "the second call must merge, not create");
    assert_eq!(p2.order_id, Some(order_id));
    assert_eq!(payment_row_count(&db).await, 1);
}

#[tokio::test]
async fn reconciler_adopts_a_new_intent_for_a_known_order() {
    let db = new_test_db().await;
    let api = SettlementApi::new(db.clone(), EventProducers::default());
    let acceptance = accept_a_bid(&db, Money::from_dollars(85)).await;
    let order_id = acceptance.order.id;

    // Order id first (a prior checkout attempt), then a fresh intent for the same order.
    let p1 = api.reconcile(PaymentUpdate::new("pi_old", Money::from_dollars(85)).for_order(order_id)).await.unwrap();
    let p2 = api.reconcile(PaymentUpdate::new("pi_new", Money::from_dollars(85)).for_order(order_id)).await.unwrap();
    assert_eq!(p2.id, p1.id, "a retried checkout must reuse the order's payment row");
    assert_eq!(p2.intent_id.as_deref(), Some("pi_new"));
    assert_eq!(payment_row_count(&db).await, 1);
}

#[tokio::test]
async fn reconciler_merge_is_monotonic() {
    let db = new_test_db().await;
    let api = SettlementApi::new(db.clone(), EventProducers::default());
    let acceptance = accept_a_bid(&db, Money::from_dollars(85)).await;
    let order_id = acceptance.order.id;

    let update = PaymentUpdate::new("pi_X", Money::from_dollars(85)).for_order(order_id).with_receipt("https://r/1");
    api.reconcile(update).await.unwrap();
    // A later, sparser event must not erase what we already know.
    let merged = api.reconcile(PaymentUpdate::new("pi_X", Money::from_dollars(85))).await.unwrap();
    assert_eq!(merged.order_id, Some(order_id));
    assert_eq!(merged.receipt_url.as_deref(), Some("https://r/1"));
    // And a different receipt does not clobber the first one seen.
    let merged = api
        .reconcile(PaymentUpdate::new("pi_X", Money::from_dollars(85)).with_receipt("https://r/2"))
        .await
        .unwrap();
    assert_eq!(merged.receipt_url.as_deref(), Some("https://r/1"));
}

//-------------------------------------- Settlement: bid-sourced orders ----------------------------------------------

#[tokio::test]
async fn bid_payment_success_settles_everything_once() {
    let db = new_test_db().await;
    let api = SettlementApi::new(db.clone(), EventProducers::default());
    let acceptance = accept_a_bid(&db, Money::from_dollars(85)).await;
    let order_id = acceptance.order.id;

    let update = PaymentUpdate::new("pi_ok", Money::from_dollars(85)).for_order(order_id);
    api.reconcile(update.clone()).await.unwrap();

    let settlement = api.on_payment_succeeded(update.clone()).await.unwrap();
    let Settlement::Applied(outcome) = settlement else {
        panic!("first delivery must apply the settlement");
    };
    assert_eq!(outcome.payment.status, PaymentStatus::Completed);
    assert_eq!(outcome.order.status, OrderStatus::Completed);
    let bid = outcome.bid.expect("the order is bid-sourced");
    assert_eq!(bid.status, BidStatus::Paid);
    let listing = outcome.listing.expect("the bid's listing is part of the outcome");
    assert_eq!(listing.status, ListingStatus::Sold);

    // Duplicate delivery is a no-op, not an error.
    let duplicate = api.on_payment_succeeded(update).await.unwrap();
    assert!(matches!(duplicate, Settlement::AlreadySettled(_)));
}

#[tokio::test]
async fn bid_payment_failure_reverts_the_listing() {
    let db = new_test_db().await;
    let api = SettlementApi::new(db.clone(), EventProducers::default());
    let acceptance = accept_a_bid(&db, Money::from_dollars(85)).await;
    assert_eq!(acceptance.listing.status, ListingStatus::Inactive);
    let order_id = acceptance.order.id;

    let update = PaymentUpdate::new("pi_bad", Money::from_dollars(85))
        .for_order(order_id)
        .with_failure_reason("card_declined");
    let settlement = api.on_payment_failed(update).await.unwrap();
    let Settlement::Applied(outcome) = settlement else {
        panic!("the failure must be applied");
    };
    assert_eq!(outcome.payment.status, PaymentStatus::Failed);
    assert_eq!(outcome.payment.failure_reason.as_deref(), Some("card_declined"));
    assert_eq!(outcome.order.status, OrderStatus::Cancelled);
    // The listing is biddable again; the bid stays Accepted so the buyer can retry payment.
    assert_eq!(outcome.listing.unwrap().status, ListingStatus::Active);
    assert_eq!(outcome.bid.unwrap().status, BidStatus::Accepted);
}

#[tokio::test]
async fn failure_without_a_gateway_reason_records_unknown_error() {
    let db = new_test_db().await;
    let api = SettlementApi::new(db.clone(), EventProducers::default());
    let acceptance = accept_a_bid(&db, Money::from_dollars(40)).await;

    let update = PaymentUpdate::new("pi_noreason", Money::from_dollars(40)).for_order(acceptance.order.id);
    let Settlement::Applied(outcome) = api.on_payment_failed(update).await.unwrap() else {
        panic!("expected applied settlement");
    };
    assert_eq!(outcome.payment.failure_reason.as_deref(), Some("Unknown error"));
}

//-------------------------------------- Settlement: cart-sourced orders ---------------------------------------------

#[tokio::test]
async fn idempotent_settlement_decrements_stock_exactly_once() {
    let db = new_test_db().await;
    let listing = seed_listing(&db, ListingSeed { quantity: 3, allow_bids: false, ..Default::default() }).await;
    seed_cart_item(&db, BUYER, listing.id, 2, Money::from_dollars(20)).await;
    let orders = OrderAssemblyApi::new(db.clone());
    let assembled = orders.order_from_cart(BUYER).await.unwrap();
    assert_eq!(assembled.order.total_price, Money::from_dollars(40));

    let api = SettlementApi::new(db.clone(), EventProducers::default());
    let update = PaymentUpdate::new("pi_cart", Money::from_dollars(40)).for_order(assembled.order.id);
    for round in 0..3 {
        let settlement = api.on_payment_succeeded(update.clone()).await.unwrap();
        match (round, settlement) {
            (0, Settlement::Applied(_)) => {},
            (_, Settlement::AlreadySettled(_)) => {},
            (r, s) => panic!("unexpected settlement on round {r}: {s:?}"),
        }
    }

    let listing = db.fetch_listing(listing.id).await.unwrap().unwrap();
    assert_eq!(listing.quantity, 1, "stock must be decremented exactly once across duplicate deliveries");
    assert_eq!(listing.status, ListingStatus::Active);
}

#[tokio::test]
async fn stock_never_goes_negative_and_zero_means_sold() {
    let db = new_test_db().await;
    let listing = seed_listing(&db, ListingSeed { quantity: 1, allow_bids: false, ..Default::default() }).await;
    // Defensive case: the order asks for more than is in stock.
    seed_cart_item(&db, BUYER, listing.id, 5, Money::from_dollars(20)).await;
    let orders = OrderAssemblyApi::new(db.clone());
    let assembled = orders.order_from_cart(BUYER).await.unwrap();

    let api = SettlementApi::new(db.clone(), EventProducers::default());
    let update = PaymentUpdate::new("pi_over", Money::from_dollars(100)).for_order(assembled.order.id);
    let Settlement::Applied(outcome) = api.on_payment_succeeded(update).await.unwrap() else {
        panic!("expected applied settlement");
    };
    assert_eq!(outcome.sold_out, vec![listing.id]);

    let listing = db.fetch_listing(listing.id).await.unwrap().unwrap();
    assert_eq!(listing.quantity, 0, "stock is floored at zero");
    assert_eq!(listing.status, ListingStatus::Sold);
}

#[tokio::test]
async fn empty_carts_cannot_become_orders() {
    let db = new_test_db().await;
    let orders = OrderAssemblyApi::new(db);
    let result = orders.order_from_cart(BUYER).await;
    assert!(matches!(result, Err(MarketplaceError::EmptyCart(_))));
}

#[tokio::test]
async fn cart_is_cleared_atomically_with_order_creation() {
    let db = new_test_db().await;
    let listing = seed_listing(&db, ListingSeed { quantity: 5, ..Default::default() }).await;
    seed_cart_item(&db, BUYER, listing.id, 1, Money::from_dollars(15)).await;
    let orders = OrderAssemblyApi::new(db.clone());
    let assembled = orders.order_from_cart(BUYER).await.unwrap();
    assert_eq!(assembled.items.len(), 1);
    assert_eq!(assembled.items[0].unit_price, Money::from_dollars(15), "item price is the cart snapshot");

    // The cart is empty now, so a second checkout attempt fails cleanly.
    let again = orders.order_from_cart(BUYER).await;
    assert!(matches!(again, Err(MarketplaceError::EmptyCart(_))));
}

//-------------------------------------- Out-of-order and event dispatch ---------------------------------------------

#[tokio::test]
async fn settlement_before_any_record_exists_creates_the_fallback_row() {
    let db = new_test_db().await;
    let api = SettlementApi::new(db.clone(), EventProducers::default());
    let acceptance = accept_a_bid(&db, Money::from_dollars(85)).await;

    // The terminal event arrives before either creation path has run.
    let update = PaymentUpdate::new("pi_race", Money::from_dollars(85)).for_order(acceptance.order.id);
    let Settlement::Applied(outcome) = api.on_payment_succeeded(update).await.unwrap() else {
        panic!("expected applied settlement");
    };
    assert_eq!(outcome.payment.status, PaymentStatus::Completed);
    assert_eq!(outcome.bid.unwrap().status, BidStatus::Paid);
    assert_eq!(payment_row_count(&db).await, 1);
}

#[tokio::test]
async fn terminal_events_without_an_order_are_parked_not_lost() {
    let db = new_test_db().await;
    let api = SettlementApi::new(db.clone(), EventProducers::default());

    // A success event for an intent we cannot route yet.
    let update = PaymentUpdate::new("pi_orphan", Money::from_dollars(10));
    let settlement = api.on_payment_succeeded(update).await.unwrap();
    let Settlement::Unmatched(payment) = settlement else {
        panic!("an orderless settlement must be reported as unmatched");
    };
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert_eq!(payment.order_id, None);
}

#[tokio::test]
async fn charge_updates_merge_receipts_after_success() {
    let db = new_test_db().await;
    let api = SettlementApi::new(db.clone(), EventProducers::default());
    let acceptance = accept_a_bid(&db, Money::from_dollars(85)).await;
    let update = PaymentUpdate::new("pi_rcpt", Money::from_dollars(85)).for_order(acceptance.order.id);
    api.on_payment_succeeded(update.clone()).await.unwrap();

    // The receipt URL arrives later on a charge.updated event.
    let charge = update.with_receipt("https://pay.example/receipts/1");
    let payment = api.on_charge_updated(charge).await.unwrap();
    assert_eq!(payment.receipt_url.as_deref(), Some("https://pay.example/receipts/1"));
    assert_eq!(payment.status, PaymentStatus::Completed, "a receipt merge never changes status");
}

#[tokio::test]
async fn gateway_events_dispatch_by_type() {
    let db = new_test_db().await;
    let api = SettlementApi::new(db.clone(), EventProducers::default());
    let acceptance = accept_a_bid(&db, Money::from_dollars(85)).await;
    let order_id = acceptance.order.id;

    let created = GatewayEvent::IntentCreated(PaymentUpdate::new("pi_evt", Money::from_dollars(85)));
    assert!(api.process_event(created).await.unwrap().is_none());
    let payment = api.payment_by_intent("pi_evt").await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);

    let succeeded =
        GatewayEvent::IntentSucceeded(PaymentUpdate::new("pi_evt", Money::from_dollars(85)).for_order(order_id));
    let settlement = api.process_event(succeeded).await.unwrap().expect("terminal events return a settlement");
    assert!(matches!(settlement, Settlement::Applied(_)));

    let payment = api.payment_for_order(order_id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
}
