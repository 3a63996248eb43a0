use sqlx::SqliteConnection;

use crate::{
    db_types::{Listing, ListingStatus},
    traits::MarketplaceError,
};

pub async fn fetch_listing(id: i64, conn: &mut SqliteConnection) -> Result<Option<Listing>, sqlx::Error> {
    let listing = sqlx::query_as("SELECT * FROM listings WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(listing)
}

/// Parks an `Active` listing as `Inactive` in preparation for a bid sale.
///
/// This is the serialisation point for concurrent acceptances: the guard on the current status
/// means that of two racing accept calls, exactly one sees `true` here.
pub async fn deactivate_for_bid_sale(id: i64, conn: &mut SqliteConnection) -> Result<bool, MarketplaceError> {
    let result = sqlx::query(
        "UPDATE listings SET status = 'Inactive', updated_at = CURRENT_TIMESTAMP WHERE id = $1 AND status = 'Active'",
    )
    .bind(id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn update_status(
    id: i64,
    status: ListingStatus,
    conn: &mut SqliteConnection,
) -> Result<Listing, MarketplaceError> {
    let result: Option<Listing> =
        sqlx::query_as("UPDATE listings SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *")
            .bind(status.to_string())
            .bind(id)
            .fetch_optional(conn)
            .await?;
    result.ok_or(MarketplaceError::ListingNotFound(id))
}

/// Reverts a listing parked by bid acceptance back to `Active` after the payment failed.
/// The status guard makes sure an unrelated event can never resurrect a Sold listing.
pub async fn reactivate_after_failed_sale(
    id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Listing>, MarketplaceError> {
    let listing = sqlx::query_as(
        "UPDATE listings SET status = 'Active', updated_at = CURRENT_TIMESTAMP WHERE id = $1 AND status = 'Inactive' \
         RETURNING *",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(listing)
}

/// Decrements stock by `quantity`, floored at zero. The caller flips the listing to `Sold` when
/// the returned row reports zero stock.
pub async fn decrement_stock(
    id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<Listing, MarketplaceError> {
    let result: Option<Listing> = sqlx::query_as(
        "UPDATE listings SET quantity = MAX(quantity - $1, 0), updated_at = CURRENT_TIMESTAMP WHERE id = $2 \
         RETURNING *",
    )
    .bind(quantity)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    result.ok_or(MarketplaceError::ListingNotFound(id))
}
