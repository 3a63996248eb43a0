use cmp_common::Money;
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Order, OrderItem, OrderStatus},
    traits::MarketplaceError,
};

pub async fn insert_order(
    user_id: i64,
    total_price: Money,
    conn: &mut SqliteConnection,
) -> Result<Order, MarketplaceError> {
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (user_id, total_price)
            VALUES ($1, $2)
            RETURNING *;
        "#,
    )
    .bind(user_id)
    .bind(total_price)
    .fetch_one(conn)
    .await?;
    debug!("📝️ Order [{}] inserted for user {} at {}", order.id, order.user_id, order.total_price);
    Ok(order)
}

pub async fn insert_order_item(
    order_id: i64,
    listing_id: i64,
    quantity: i64,
    unit_price: Money,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, MarketplaceError> {
    let item = sqlx::query_as(
        r#"
            INSERT INTO order_items (order_id, listing_id, quantity, unit_price)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(listing_id)
    .bind(quantity)
    .bind(unit_price)
    .fetch_one(conn)
    .await?;
    Ok(item)
}

pub async fn fetch_order(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_items(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// Moves a `Pending` order to a terminal status. Returns `None` when the order has already left
/// `Pending`, which is how duplicate settlement deliveries are detected as no-ops.
pub async fn transition_from_pending(
    order_id: i64,
    new_status: OrderStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, MarketplaceError> {
    let order = sqlx::query_as(
        "UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND status = 'Pending' \
         RETURNING *",
    )
    .bind(new_status.to_string())
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}
