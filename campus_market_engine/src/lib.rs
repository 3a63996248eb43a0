//! Campus Market Engine
//!
//! The engine drives the hard part of the campus marketplace backend: the bid negotiation state
//! machine, conversion of accepted bids and carts into orders, and reconciliation of those orders
//! against an external payment gateway that delivers duplicated, out-of-order webhook events.
//!
//! The crate is divided into three main sections:
//! 1. Database management and control ([`mod@sqlite`]). SQLite is the supported backend (a
//!    Postgres feature stub exists for parity with deployments that need it). You should never
//!    need to access the database directly; use the public APIs instead. The exception is the
//!    data types used in the database, which live in [`mod@db_types`] and are public.
//! 2. The engine public API ([`mod@mkt_api`]): [`BidFlowApi`] for the negotiation state machine,
//!    [`OrderAssemblyApi`] for building orders, and [`SettlementApi`] for payment reconciliation
//!    and settlement. Backends implement the traits in [`mod@traits`] to plug in underneath.
//! 3. A fire-and-forget event hook system ([`mod@events`]). Settlement and bid transitions emit
//!    events after their transactions commit; subscribers (typically the notification sink) react
//!    without ever holding up or failing the transition itself.

pub mod db_types;
pub mod events;
pub mod helpers;
pub mod mkt_api;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::{run_migrations, SqliteDatabase};
pub use mkt_api::{
    bid_flow_api::BidFlowApi,
    order_assembly_api::OrderAssemblyApi,
    payment_objects::{GatewayEvent, PaymentOutcome},
    settlement_api::SettlementApi,
};
pub use traits::{
    BidManagement,
    MarketplaceDatabase,
    MarketplaceError,
    OrderManagement,
    PaymentReconciliation,
};
