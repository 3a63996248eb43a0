pub mod db;
mod sqlite_impl;

use log::info;
use sqlx::SqlitePool;

pub use sqlite_impl::SqliteDatabase;

use crate::traits::MarketplaceError;

/// Applies the embedded migrations to the given pool.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), MarketplaceError> {
    sqlx::migrate!("./src/sqlite/migrations")
        .run(pool)
        .await
        .map_err(|e| MarketplaceError::DatabaseError(e.to_string()))?;
    info!("🗃️ Database migrations complete");
    Ok(())
}
