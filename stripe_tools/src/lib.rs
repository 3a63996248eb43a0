//! A deliberately small Stripe client.
//!
//! This crate covers exactly the slice of the Stripe API that the campus market server needs:
//! creating checkout sessions, retrieving payment intents and charges (for receipt URLs), and the
//! typed webhook event envelope. It is not a general-purpose SDK.

mod api;
mod config;
mod error;

pub mod data_objects;
pub mod helpers;

pub use api::{NewCheckoutSession, StripeApi};
pub use config::StripeConfig;
pub use data_objects::{Charge, CheckoutSession, PaymentIntent, StripeEvent};
pub use error::StripeApiError;
