use sqlx::SqliteConnection;

use crate::db_types::CartItem;

/// The user's current cart snapshot, in insertion order.
pub async fn cart_items_for_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<CartItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM cart_items WHERE user_id = $1 ORDER BY id ASC")
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// Empties the user's cart. Runs inside the order-assembly transaction so a cart is never
/// cleared without its order existing, or vice versa.
pub async fn clear_cart(user_id: i64, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1").bind(user_id).execute(conn).await?;
    Ok(result.rows_affected())
}
