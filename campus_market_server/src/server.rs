use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use campus_market_engine::{
    events::EventProducers,
    run_migrations,
    BidFlowApi,
    OrderAssemblyApi,
    SettlementApi,
    SqliteDatabase,
};
use stripe_tools::StripeApi;

use crate::{
    checkout_routes::{BidCheckoutRoute, CartCheckoutRoute, OrderCheckoutRoute},
    config::ServerConfig,
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    integrations::{
        identity::IdentityApi,
        notifier::{create_notification_event_handlers, Notifier},
    },
    routes::{
        health,
        AcceptBidRoute,
        ActiveBidCountRoute,
        BidsForListingRoute,
        CounterBidRoute,
        FinalizeBiddingRoute,
        MyBidsRoute,
        PlaceBidRoute,
        UpdateBidStatusRoute,
    },
    webhook_routes::StripeWebhookRoute,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    run_migrations(db.pool()).await.map_err(|e| ServerError::InitializeError(e.to_string()))?;

    // Wire the notification sink to the engine's event hooks. Handlers run on their own tasks;
    // the flow APIs only ever hold cheap producer handles.
    let notifier = Notifier::new(config.notifier_url.clone());
    let identity = IdentityApi::new(config.identity_url.clone());
    let handlers = create_notification_event_handlers(notifier, identity);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    start_expiry_worker(db.clone(), producers.clone(), config.bid_expiry_timeout);

    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let stripe_api = StripeApi::new(config.stripe.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let checkout_config = config.checkout.clone();
    let srv = HttpServer::new(move || {
        let bid_api = BidFlowApi::new(db.clone(), producers.clone());
        let order_api = OrderAssemblyApi::new(db.clone());
        let settlement_api = SettlementApi::new(db.clone(), producers.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("cms::access_log"))
            .app_data(web::Data::new(bid_api))
            .app_data(web::Data::new(order_api))
            .app_data(web::Data::new(settlement_api))
            .app_data(web::Data::new(stripe_api.clone()))
            .app_data(web::Data::new(checkout_config.clone()))
            .service(health)
            .service(PlaceBidRoute::<SqliteDatabase>::new())
            .service(CounterBidRoute::<SqliteDatabase>::new())
            .service(UpdateBidStatusRoute::<SqliteDatabase>::new())
            .service(AcceptBidRoute::<SqliteDatabase>::new())
            .service(FinalizeBiddingRoute::<SqliteDatabase>::new())
            .service(BidsForListingRoute::<SqliteDatabase>::new())
            .service(MyBidsRoute::<SqliteDatabase>::new())
            .service(ActiveBidCountRoute::<SqliteDatabase>::new())
            .service(BidCheckoutRoute::<SqliteDatabase, SqliteDatabase>::new())
            .service(CartCheckoutRoute::<SqliteDatabase, SqliteDatabase>::new())
            .service(OrderCheckoutRoute::<SqliteDatabase, SqliteDatabase>::new())
            .service(StripeWebhookRoute::<SqliteDatabase>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
