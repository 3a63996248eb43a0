use cmp_common::Money;
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Payment, PaymentStatus},
    traits::MarketplaceError,
};

pub async fn fetch_by_intent(intent_id: &str, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    let payment =
        sqlx::query_as("SELECT * FROM payments WHERE intent_id = $1").bind(intent_id).fetch_optional(conn).await?;
    Ok(payment)
}

pub async fn fetch_by_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    let payment =
        sqlx::query_as("SELECT * FROM payments WHERE order_id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(payment)
}

pub async fn insert_pending(
    intent_id: &str,
    order_id: Option<i64>,
    amount: Money,
    currency: &str,
    receipt_url: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Payment, sqlx::Error> {
    let payment: Payment = sqlx::query_as(
        r#"
            INSERT INTO payments (intent_id, order_id, amount, currency, receipt_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(intent_id)
    .bind(order_id)
    .bind(amount)
    .bind(currency)
    .bind(receipt_url)
    .fetch_one(conn)
    .await?;
    debug!("📝️ Payment [{}] created for intent [{intent_id}] (order: {order_id:?})", payment.id);
    Ok(payment)
}

/// Monotonic merge: fills in the order id and receipt URL only where they are currently absent.
/// Known values are never downgraded or overwritten.
pub async fn merge_onto(
    id: i64,
    order_id: Option<i64>,
    receipt_url: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Payment, MarketplaceError> {
    let result: Option<Payment> = sqlx::query_as(
        r#"
            UPDATE payments SET
                order_id = COALESCE(order_id, $1),
                receipt_url = COALESCE(receipt_url, $2),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $3
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(receipt_url)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    result.ok_or(MarketplaceError::DatabaseError(format!("Payment {id} vanished mid-merge")))
}

/// Adopts a new gateway intent id for the payment. Intent ids legitimately change when a buyer
/// abandons a checkout session and starts a new one for the same order.
pub async fn adopt_intent(id: i64, intent_id: &str, conn: &mut SqliteConnection) -> Result<Payment, MarketplaceError> {
    let result: Option<Payment> =
        sqlx::query_as("UPDATE payments SET intent_id = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *")
            .bind(intent_id)
            .bind(id)
            .fetch_optional(conn)
            .await?;
    result.ok_or(MarketplaceError::DatabaseError(format!("Payment {id} vanished while adopting intent")))
}

pub async fn set_terminal_status(
    id: i64,
    status: PaymentStatus,
    failure_reason: Option<&str>,
    receipt_url: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Payment, MarketplaceError> {
    let result: Option<Payment> = sqlx::query_as(
        r#"
            UPDATE payments SET
                status = $1,
                failure_reason = COALESCE($2, failure_reason),
                receipt_url = COALESCE(receipt_url, $3),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $4
            RETURNING *;
        "#,
    )
    .bind(status.to_string())
    .bind(failure_reason)
    .bind(receipt_url)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    result.ok_or(MarketplaceError::DatabaseError(format!("Payment {id} vanished while settling")))
}

/// Fills in a receipt URL for the payment with this intent id, if the payment exists and has no
/// receipt yet.
pub async fn attach_receipt(
    intent_id: &str,
    receipt_url: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as(
        "UPDATE payments SET receipt_url = $1, updated_at = CURRENT_TIMESTAMP WHERE intent_id = $2 AND receipt_url \
         IS NULL RETURNING *",
    )
    .bind(receipt_url)
    .bind(intent_id)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}
