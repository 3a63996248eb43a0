use actix_web::{http::StatusCode, web, web::ServiceConfig};
use campus_market_engine::{
    db_types::BidStatus,
    events::EventProducers,
    traits::MarketplaceError,
    BidFlowApi,
};
use cmp_common::Money;
use log::debug;

use super::{
    helpers::{get_request, post_request},
    mocks::{sample_bid, sample_listing, MockBidManager},
};
use crate::routes::{AcceptBidRoute, ActiveBidCountRoute, PlaceBidRoute};

fn configure_with(mock: MockBidManager) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        let api = BidFlowApi::new(mock, EventProducers::default());
        cfg.app_data(web::Data::new(api))
            .service(PlaceBidRoute::<MockBidManager>::new())
            .service(AcceptBidRoute::<MockBidManager>::new())
            .service(ActiveBidCountRoute::<MockBidManager>::new());
    }
}

#[actix_web::test]
async fn place_bid_requires_an_authenticated_user() {
    let _ = env_logger::try_init().ok();
    let mock = MockBidManager::new();
    let body = serde_json::json!({ "listing_id": 1, "price": 8000 });
    let (status, body) = post_request(None, "/bids", body, configure_with(mock)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("No authenticated user id"), "unexpected body: {body}");
}

#[actix_web::test]
async fn place_bid_happy_path() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockBidManager::new();
    mock.expect_insert_bid().times(1).returning(|new| {
        assert_eq!(new.buyer_id, 2, "the actor id must come from the auth header");
        Ok((sample_bid(10, new.listing_id, new.buyer_id, new.price, BidStatus::Pending), sample_listing(1, 1)))
    });
    let body = serde_json::json!({ "listing_id": 1, "price": 8000, "terms": "cash on pickup" });
    let (status, body) = post_request(Some(2), "/bids", body, configure_with(mock)).await;
    debug!("place_bid response: {body}");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("\"Pending\""), "unexpected body: {body}");
}

#[actix_web::test]
async fn bids_below_the_floor_are_rejected_with_400() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockBidManager::new();
    mock.expect_insert_bid().times(1).returning(|new| {
        Err(MarketplaceError::BidBelowFloor { offered: new.price, floor: Money::from_dollars(50) })
    });
    let body = serde_json::json!({ "listing_id": 1, "price": 4000 });
    let (status, body) = post_request(Some(2), "/bids", body, configure_with(mock)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("below the listing floor"), "unexpected body: {body}");
}

#[actix_web::test]
async fn active_bid_counts_are_served() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockBidManager::new();
    mock.expect_active_bid_count().times(1).returning(|_| Ok(2));
    let (status, body) = get_request(Some(2), "/listings/1/bids/active_count", configure_with(mock)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("\"active_bids\":2"), "unexpected body: {body}");
}

#[actix_web::test]
async fn only_the_seller_can_accept_a_bid() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockBidManager::new();
    mock.expect_accept_bid()
        .times(1)
        .returning(|_, actor| Err(MarketplaceError::NotListingSeller { actor, listing_id: 1 }));
    let (status, _body) =
        post_request(Some(99), "/bids/10/accept", serde_json::json!({}), configure_with(mock)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn accepting_a_settled_bid_conflicts() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockBidManager::new();
    mock.expect_accept_bid()
        .times(1)
        .returning(|bid_id, _| Err(MarketplaceError::BidNotOpen { bid_id, status: BidStatus::Paid }));
    let (status, _body) = post_request(Some(1), "/bids/10/accept", serde_json::json!({}), configure_with(mock)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}
