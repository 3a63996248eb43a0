use chrono::Duration;
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Bid, BidStatus, NewBid},
    traits::MarketplaceError,
};

pub async fn insert_bid(
    bid: NewBid,
    status: BidStatus,
    conn: &mut SqliteConnection,
) -> Result<Bid, MarketplaceError> {
    let bid: Bid = sqlx::query_as(
        r#"
            INSERT INTO bids (listing_id, buyer_id, price, terms, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(bid.listing_id)
    .bind(bid.buyer_id)
    .bind(bid.price)
    .bind(bid.terms)
    .bind(status.to_string())
    .fetch_one(conn)
    .await?;
    debug!("📝️ Bid [{}] inserted on listing [{}]", bid.id, bid.listing_id);
    Ok(bid)
}

pub async fn fetch_bid(id: i64, conn: &mut SqliteConnection) -> Result<Option<Bid>, sqlx::Error> {
    let bid = sqlx::query_as("SELECT * FROM bids WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(bid)
}

pub async fn fetch_bid_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Bid>, sqlx::Error> {
    let bid = sqlx::query_as("SELECT * FROM bids WHERE order_id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(bid)
}

pub async fn update_bid_status(
    id: i64,
    status: BidStatus,
    conn: &mut SqliteConnection,
) -> Result<Bid, MarketplaceError> {
    let result: Option<Bid> =
        sqlx::query_as("UPDATE bids SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *")
            .bind(status.to_string())
            .bind(id)
            .fetch_optional(conn)
            .await?;
    result.ok_or(MarketplaceError::BidNotFound(id))
}

pub async fn link_order(id: i64, order_id: i64, conn: &mut SqliteConnection) -> Result<Bid, MarketplaceError> {
    let result: Option<Bid> =
        sqlx::query_as("UPDATE bids SET order_id = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *")
            .bind(order_id)
            .bind(id)
            .fetch_optional(conn)
            .await?;
    result.ok_or(MarketplaceError::BidNotFound(id))
}

/// Rejects every open (`Pending` or `Countered`) bid on the listing except `keep`, returning the
/// bids that were rejected so each buyer can be notified.
pub async fn reject_open_bids_except(
    listing_id: i64,
    keep: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Bid>, MarketplaceError> {
    let rejected = sqlx::query_as(
        r#"
            UPDATE bids SET status = 'Rejected', updated_at = CURRENT_TIMESTAMP
            WHERE listing_id = $1 AND id <> $2 AND status IN ('Pending', 'Countered')
            RETURNING *;
        "#,
    )
    .bind(listing_id)
    .bind(keep)
    .fetch_all(conn)
    .await?;
    Ok(rejected)
}

/// The strictly highest-priced `Pending` bid on a listing. Price ties break towards the earliest
/// bid, then the lowest id, so the winner is deterministic regardless of row order on disk.
pub async fn highest_pending_bid(
    listing_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Bid>, sqlx::Error> {
    let bid = sqlx::query_as(
        "SELECT * FROM bids WHERE listing_id = $1 AND status = 'Pending' ORDER BY price DESC, created_at ASC, id ASC \
         LIMIT 1",
    )
    .bind(listing_id)
    .fetch_optional(conn)
    .await?;
    Ok(bid)
}

/// All bids on a listing, newest first, preserving the full negotiation history.
pub async fn bids_for_listing(listing_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Bid>, sqlx::Error> {
    let bids = sqlx::query_as("SELECT * FROM bids WHERE listing_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(listing_id)
        .fetch_all(conn)
        .await?;
    Ok(bids)
}

pub async fn bids_for_user(buyer_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Bid>, sqlx::Error> {
    let bids = sqlx::query_as("SELECT * FROM bids WHERE buyer_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(buyer_id)
        .fetch_all(conn)
        .await?;
    Ok(bids)
}

pub async fn active_bid_count(listing_id: i64, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let count: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM bids WHERE listing_id = $1 AND status IN ('Pending', 'Countered')")
            .bind(listing_id)
            .fetch_one(conn)
            .await?;
    Ok(count.0)
}

pub async fn expire_stale(limit: Duration, conn: &mut SqliteConnection) -> Result<Vec<Bid>, MarketplaceError> {
    let rows = sqlx::query_as(
        format!(
            "UPDATE bids SET updated_at = CURRENT_TIMESTAMP, status = 'Expired' WHERE status IN ('Pending', \
             'Countered') AND (unixepoch(CURRENT_TIMESTAMP) - unixepoch(updated_at)) > {} RETURNING *;",
            limit.num_seconds()
        )
        .as_str(),
    )
    .fetch_all(conn)
    .await?;
    Ok(rows)
}
