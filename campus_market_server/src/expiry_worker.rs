use campus_market_engine::{db_types::Bid, events::EventProducers, BidFlowApi, SqliteDatabase};
use chrono::Duration;
use log::*;
use tokio::task::JoinHandle;

/// Starts the bid expiry worker. Do not await the returned JoinHandle, as it will run
/// indefinitely.
pub fn start_expiry_worker(db: SqliteDatabase, producers: EventProducers, expiry: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(60));
        let api = BidFlowApi::new(db, producers);
        info!("🕰️ Stale bid expiry worker started (bids idle for {} hrs expire)", expiry.num_hours());
        loop {
            timer.tick().await;
            trace!("🕰️ Running stale bid expiry job");
            match api.expire_stale_bids(expiry).await {
                Ok(expired) if expired.is_empty() => {},
                Ok(expired) => {
                    info!("🕰️ {} bids expired", expired.len());
                    debug!("🕰️ Expired bids: {}", bid_list(&expired));
                },
                Err(e) => {
                    error!("🕰️ Error running stale bid expiry job: {e}");
                },
            }
        }
    })
}

fn bid_list(bids: &[Bid]) -> String {
    bids.iter()
        .map(|b| format!("[{}] listing: {} buyer: {} price: {}", b.id, b.listing_id, b.buyer_id, b.price))
        .collect::<Vec<String>>()
        .join(", ")
}
