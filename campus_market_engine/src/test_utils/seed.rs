//! Fixture helpers for tests. Listing and cart CRUD belong to other services in production, so
//! tests seed those tables directly.
use cmp_common::Money;

use crate::{
    db_types::{Listing, ListingStatus},
    SqliteDatabase,
};

#[derive(Debug, Clone)]
pub struct ListingSeed {
    pub seller_id: i64,
    pub title: String,
    pub price: Money,
    pub floor_price: Option<Money>,
    pub allow_bids: bool,
    pub quantity: i64,
    pub status: ListingStatus,
}

impl Default for ListingSeed {
    fn default() -> Self {
        Self {
            seller_id: 1,
            title: "Dorm fridge".to_string(),
            price: Money::from_dollars(100),
            floor_price: None,
            allow_bids: true,
            quantity: 1,
            status: ListingStatus::Active,
        }
    }
}

pub async fn seed_listing(db: &SqliteDatabase, seed: ListingSeed) -> Listing {
    sqlx::query_as(
        r#"
            INSERT INTO listings (seller_id, title, price, floor_price, allow_bids, quantity, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(seed.seller_id)
    .bind(seed.title)
    .bind(seed.price)
    .bind(seed.floor_price)
    .bind(seed.allow_bids)
    .bind(seed.quantity)
    .bind(seed.status.to_string())
    .fetch_one(db.pool())
    .await
    .expect("Error seeding listing")
}

pub async fn seed_cart_item(db: &SqliteDatabase, user_id: i64, listing_id: i64, quantity: i64, unit_price: Money) {
    sqlx::query("INSERT INTO cart_items (user_id, listing_id, quantity, unit_price) VALUES ($1, $2, $3, $4)")
        .bind(user_id)
        .bind(listing_id)
        .bind(quantity)
        .bind(unit_price)
        .execute(db.pool())
        .await
        .expect("Error seeding cart item");
}
