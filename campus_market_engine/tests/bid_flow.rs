mod helpers;

use campus_market_engine::{
    db_types::{BidStatus, ListingStatus, NewBid, OrderStatus},
    events::EventProducers,
    test_utils::seed::{seed_listing, ListingSeed},
    BidFlowApi,
    MarketplaceError,
};
use cmp_common::Money;
use helpers::new_test_db;

const SELLER: i64 = 1;

#[tokio::test]
async fn floor_enforcement() {
    let db = new_test_db().await;
    let listing = seed_listing(&db, ListingSeed { floor_price: Some(Money::from_dollars(50)), ..Default::default() }).await;
    let api = BidFlowApi::new(db, EventProducers::default());

    let low = api.place_bid(NewBid::new(listing.id, 2, Money::from_dollars(40))).await;
    assert!(matches!(low, Err(MarketplaceError::BidBelowFloor { .. })), "Expected floor rejection, got {low:?}");

    let at_floor = api.place_bid(NewBid::new(listing.id, 2, Money::from_dollars(50))).await.unwrap();
    assert_eq!(at_floor.status, BidStatus::Pending);
    assert_eq!(at_floor.price, Money::from_dollars(50));
}

#[tokio::test]
async fn sellers_cannot_bid_on_their_own_listing() {
    let db = new_test_db().await;
    let listing = seed_listing(&db, ListingSeed::default()).await;
    let api = BidFlowApi::new(db, EventProducers::default());

    let result = api.place_bid(NewBid::new(listing.id, SELLER, Money::from_dollars(80))).await;
    assert!(matches!(result, Err(MarketplaceError::SelfBid(_))));
}

#[tokio::test]
async fn bids_require_a_biddable_listing() {
    let db = new_test_db().await;
    let closed = seed_listing(&db, ListingSeed { allow_bids: false, ..Default::default() }).await;
    let inactive = seed_listing(&db, ListingSeed { status: ListingStatus::Inactive, ..Default::default() }).await;
    let api = BidFlowApi::new(db, EventProducers::default());

    for listing_id in [closed.id, inactive.id] {
        let result = api.place_bid(NewBid::new(listing_id, 2, Money::from_dollars(80))).await;
        assert!(matches!(result, Err(MarketplaceError::BiddingClosed(_))), "listing {listing_id} accepted a bid");
    }
}

#[tokio::test]
async fn exclusive_acceptance() {
    let db = new_test_db().await;
    let listing = seed_listing(&db, ListingSeed::default()).await;
    let api = BidFlowApi::new(db.clone(), EventProducers::default());

    let b1 = api.place_bid(NewBid::new(listing.id, 2, Money::from_dollars(80))).await.unwrap();
    let b2 = api.place_bid(NewBid::new(listing.id, 3, Money::from_dollars(85))).await.unwrap();
    let b3 = api.place_bid(NewBid::new(listing.id, 4, Money::from_dollars(90))).await.unwrap();

    let acceptance = api.accept_bid(b2.id, SELLER).await.unwrap();
    assert_eq!(acceptance.accepted.id, b2.id);
    assert_eq!(acceptance.accepted.status, BidStatus::Accepted);
    let mut rejected_ids: Vec<i64> = acceptance.rejected.iter().map(|b| b.id).collect();
    rejected_ids.sort_unstable();
    assert_eq!(rejected_ids, vec![b1.id, b3.id]);
    assert!(acceptance.rejected.iter().all(|b| b.status == BidStatus::Rejected));
    assert_eq!(acceptance.listing.status, ListingStatus::Inactive);

    // Exactly one order, at the accepted price, linked back onto the bid.
    assert_eq!(acceptance.order.total_price, Money::from_dollars(85));
    assert_eq!(acceptance.order.status, OrderStatus::Pending);
    assert_eq!(acceptance.accepted.order_id, Some(acceptance.order.id));
    assert_eq!(api.active_bid_count(listing.id).await.unwrap(), 0);
}

#[tokio::test]
async fn finalize_picks_highest() {
    let db = new_test_db().await;
    let listing = seed_listing(&db, ListingSeed::default()).await;
    let api = BidFlowApi::new(db, EventProducers::default());

    api.place_bid(NewBid::new(listing.id, 2, Money::from_dollars(80))).await.unwrap();
    api.place_bid(NewBid::new(listing.id, 3, Money::from_dollars(85))).await.unwrap();
    let b3 = api.place_bid(NewBid::new(listing.id, 4, Money::from_dollars(90))).await.unwrap();

    let acceptance = api.finalize_bidding(listing.id, SELLER).await.unwrap();
    assert_eq!(acceptance.accepted.id, b3.id);
    assert_eq!(acceptance.order.total_price, Money::from_dollars(90));
    assert_eq!(acceptance.rejected.len(), 2);
}

#[tokio::test]
async fn finalize_breaks_price_ties_towards_the_earliest_bid() {
    let db = new_test_db().await;
    let listing = seed_listing(&db, ListingSeed::default()).await;
    let api = BidFlowApi::new(db, EventProducers::default());

    let first = api.place_bid(NewBid::new(listing.id, 2, Money::from_dollars(90))).await.unwrap();
    let _second = api.place_bid(NewBid::new(listing.id, 3, Money::from_dollars(90))).await.unwrap();

    let acceptance = api.finalize_bidding(listing.id, SELLER).await.unwrap();
    assert_eq!(acceptance.accepted.id, first.id, "the earlier of two equal-price bids should win");
}

#[tokio::test]
async fn finalize_with_no_open_bids_fails() {
    let db = new_test_db().await;
    let listing = seed_listing(&db, ListingSeed::default()).await;
    let api = BidFlowApi::new(db, EventProducers::default());

    let result = api.finalize_bidding(listing.id, SELLER).await;
    assert!(matches!(result, Err(MarketplaceError::NoOpenBids(_))));
}

#[tokio::test]
async fn counter_offers_preserve_history() {
    let db = new_test_db().await;
    let listing = seed_listing(&db, ListingSeed::default()).await;
    let api = BidFlowApi::new(db, EventProducers::default());

    let bid = api.place_bid(NewBid::new(listing.id, 2, Money::from_dollars(60)).with_terms("cash on pickup")).await.unwrap();
    let outcome = api.counter_bid(bid.id, SELLER, Money::from_dollars(75), None).await.unwrap();

    assert_eq!(outcome.original.id, bid.id);
    assert_eq!(outcome.original.status, BidStatus::Countered);
    assert_eq!(outcome.original.price, Money::from_dollars(60), "history must keep the original price");
    assert_ne!(outcome.counter.id, bid.id, "the counter-offer is a new row");
    assert_eq!(outcome.counter.status, BidStatus::Countered);
    assert_eq!(outcome.counter.price, Money::from_dollars(75));
    assert_eq!(outcome.counter.buyer_id, bid.buyer_id);

    // Both rows keep the negotiation open.
    assert_eq!(api.active_bid_count(listing.id).await.unwrap(), 2);
    let history = api.bids_for_listing(listing.id).await.unwrap();
    assert_eq!(history.len(), 2);

    // A countered bid can still be accepted.
    let acceptance = api.accept_bid(outcome.counter.id, SELLER).await.unwrap();
    assert_eq!(acceptance.accepted.status, BidStatus::Accepted);
    assert_eq!(acceptance.rejected.len(), 1, "the original countered row is rejected by the cascade");
}

#[tokio::test]
async fn counter_requires_the_seller() {
    let db = new_test_db().await;
    let listing = seed_listing(&db, ListingSeed::default()).await;
    let api = BidFlowApi::new(db, EventProducers::default());

    let bid = api.place_bid(NewBid::new(listing.id, 2, Money::from_dollars(60))).await.unwrap();
    let result = api.counter_bid(bid.id, 999, Money::from_dollars(75), None).await;
    assert!(matches!(result, Err(MarketplaceError::NotListingSeller { .. })));
}

#[tokio::test]
async fn status_updates_are_guarded() {
    let db = new_test_db().await;
    let listing = seed_listing(&db, ListingSeed::default()).await;
    let api = BidFlowApi::new(db, EventProducers::default());
    let bid = api.place_bid(NewBid::new(listing.id, 2, Money::from_dollars(60))).await.unwrap();

    // Paid is reachable only through settlement; Pending/Expired are not externally settable.
    for status in [BidStatus::Paid, BidStatus::Pending, BidStatus::Expired] {
        let result = api.update_bid_status(bid.id, SELLER, status).await;
        assert!(
            matches!(result, Err(MarketplaceError::InvalidBidTransition { .. })),
            "status {status} should be rejected, got {result:?}"
        );
    }

    let rejected = api.update_bid_status(bid.id, SELLER, BidStatus::Rejected).await.unwrap();
    assert_eq!(rejected.status, BidStatus::Rejected);

    // Terminal bids cannot be acted on again.
    let again = api.update_bid_status(bid.id, SELLER, BidStatus::Rejected).await;
    assert!(matches!(again, Err(MarketplaceError::BidNotOpen { .. })));
}

#[tokio::test]
async fn acceptance_requires_an_active_listing() {
    let db = new_test_db().await;
    let listing = seed_listing(&db, ListingSeed::default()).await;
    let api = BidFlowApi::new(db.clone(), EventProducers::default());
    let bid = api.place_bid(NewBid::new(listing.id, 2, Money::from_dollars(60))).await.unwrap();

    // Simulate a concurrent sale parking the listing between bid placement and acceptance.
    sqlx::query("UPDATE listings SET status = 'Inactive' WHERE id = $1")
        .bind(listing.id)
        .execute(db.pool())
        .await
        .unwrap();

    let result = api.accept_bid(bid.id, SELLER).await;
    assert!(matches!(result, Err(MarketplaceError::ListingUnavailable(_))));

    // Nothing was applied: the bid is still open.
    let unchanged = api.bids_for_listing(listing.id).await.unwrap();
    assert_eq!(unchanged[0].status, BidStatus::Pending);
}

#[tokio::test]
async fn bid_queries() {
    let db = new_test_db().await;
    let listing_a = seed_listing(&db, ListingSeed::default()).await;
    let listing_b = seed_listing(&db, ListingSeed { seller_id: 9, ..Default::default() }).await;
    let api = BidFlowApi::new(db, EventProducers::default());

    api.place_bid(NewBid::new(listing_a.id, 2, Money::from_dollars(10))).await.unwrap();
    api.place_bid(NewBid::new(listing_a.id, 3, Money::from_dollars(20))).await.unwrap();
    api.place_bid(NewBid::new(listing_b.id, 2, Money::from_dollars(30))).await.unwrap();

    assert_eq!(api.bids_for_listing(listing_a.id).await.unwrap().len(), 2);
    assert_eq!(api.bids_for_user(2).await.unwrap().len(), 2);
    assert_eq!(api.bids_for_user(3).await.unwrap().len(), 1);
    assert_eq!(api.active_bid_count(listing_a.id).await.unwrap(), 2);
    assert_eq!(api.active_bid_count(listing_b.id).await.unwrap(), 1);
}
