use campus_market_engine::{
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    SqliteDatabase,
};

pub async fn new_test_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error connecting to test database")
}
