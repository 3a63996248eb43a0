//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module
//! neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the
//! current thread will stop that worker from processing new requests. For this reason, any
//! long, non-cpu-bound operation (I/O, database queries, gateway calls) must be expressed as a
//! future and awaited, so that worker threads interleave other requests while waiting.
use actix_web::{get, web, HttpResponse, Responder};
use campus_market_engine::{db_types::NewBid, BidFlowApi, BidManagement};
use log::*;

use crate::{
    auth::AuthenticatedUser,
    data_objects::{ActiveBidCountResponse, BidStatusUpdateRequest, CounterBidRequest, NewBidRequest},
    errors::ServerError,
};

// Actix-web cannot handle generics in handlers, so the service registration is implemented
// manually using the `route!` macro.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Bids  -------------------------------------------------------
route!(place_bid => Post "/bids" impl BidManagement);
/// Place a new bid on a listing. The authenticated user is the buyer.
pub async fn place_bid<B: BidManagement>(
    user: AuthenticatedUser,
    body: web::Json<NewBidRequest>,
    api: web::Data<BidFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    debug!("💻️ POST /bids: user {} offers {} on listing {}", user.id, req.price, req.listing_id);
    let mut bid = NewBid::new(req.listing_id, user.id, req.price);
    if let Some(terms) = req.terms {
        bid = bid.with_terms(terms);
    }
    let bid = api.place_bid(bid).await?;
    Ok(HttpResponse::Ok().json(bid))
}

route!(counter_bid => Post "/bids/{id}/counter" impl BidManagement);
/// Seller counters a buyer's bid with a new price. History is preserved as a new bid row.
pub async fn counter_bid<B: BidManagement>(
    user: AuthenticatedUser,
    path: web::Path<i64>,
    body: web::Json<CounterBidRequest>,
    api: web::Data<BidFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let bid_id = path.into_inner();
    let req = body.into_inner();
    debug!("💻️ POST /bids/{bid_id}/counter: user {} counters at {}", user.id, req.price);
    let outcome = api.counter_bid(bid_id, user.id, req.price, req.terms).await?;
    Ok(HttpResponse::Ok().json(outcome.counter))
}

route!(update_bid_status => Post "/bids/{id}/status" impl BidManagement);
/// Seller-side status change. Only Accepted, Rejected and Countered are reachable here; Paid is
/// reserved for the settlement engine.
pub async fn update_bid_status<B: BidManagement>(
    user: AuthenticatedUser,
    path: web::Path<i64>,
    body: web::Json<BidStatusUpdateRequest>,
    api: web::Data<BidFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let bid_id = path.into_inner();
    let new_status = body.into_inner().status;
    debug!("💻️ POST /bids/{bid_id}/status: user {} requests {new_status}", user.id);
    let bid = api.update_bid_status(bid_id, user.id, new_status).await?;
    Ok(HttpResponse::Ok().json(bid))
}

route!(accept_bid => Post "/bids/{id}/accept" impl BidManagement);
/// Accept one bid: rejects all competing open bids, parks the listing and creates the order.
pub async fn accept_bid<B: BidManagement>(
    user: AuthenticatedUser,
    path: web::Path<i64>,
    api: web::Data<BidFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let bid_id = path.into_inner();
    debug!("💻️ POST /bids/{bid_id}/accept by user {}", user.id);
    let acceptance = api.accept_bid(bid_id, user.id).await?;
    Ok(HttpResponse::Ok().json(acceptance.accepted))
}

route!(finalize_bidding => Post "/listings/{id}/finalize" impl BidManagement);
/// Accept the highest pending bid on the listing. Ties resolve to the earliest bid.
pub async fn finalize_bidding<B: BidManagement>(
    user: AuthenticatedUser,
    path: web::Path<i64>,
    api: web::Data<BidFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let listing_id = path.into_inner();
    debug!("💻️ POST /listings/{listing_id}/finalize by user {}", user.id);
    let acceptance = api.finalize_bidding(listing_id, user.id).await?;
    Ok(HttpResponse::Ok().json(acceptance.accepted))
}

route!(bids_for_listing => Get "/listings/{id}/bids" impl BidManagement);
/// Full bid history for a listing, newest first.
pub async fn bids_for_listing<B: BidManagement>(
    _user: AuthenticatedUser,
    path: web::Path<i64>,
    api: web::Data<BidFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let listing_id = path.into_inner();
    let bids = api.bids_for_listing(listing_id).await?;
    Ok(HttpResponse::Ok().json(bids))
}

route!(my_bids => Get "/bids/mine" impl BidManagement);
pub async fn my_bids<B: BidManagement>(
    user: AuthenticatedUser,
    api: web::Data<BidFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let bids = api.bids_for_user(user.id).await?;
    Ok(HttpResponse::Ok().json(bids))
}

route!(active_bid_count => Get "/listings/{id}/bids/active_count" impl BidManagement);
pub async fn active_bid_count<B: BidManagement>(
    _user: AuthenticatedUser,
    path: web::Path<i64>,
    api: web::Data<BidFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let listing_id = path.into_inner();
    let active_bids = api.active_bid_count(listing_id).await?;
    Ok(HttpResponse::Ok().json(ActiveBidCountResponse { listing_id, active_bids }))
}
