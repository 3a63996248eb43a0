use std::env;

use cmp_common::Secret;
use log::*;

pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com/v1";
/// All calls to Stripe carry a bounded timeout so that a wedged gateway never stalls a request
/// thread indefinitely.
pub const DEFAULT_STRIPE_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Debug)]
pub struct StripeConfig {
    /// Base URL for the Stripe REST API. Overridable for tests against a local stub.
    pub api_base: String,
    /// The secret API key (`sk_...`) used as a bearer token.
    pub secret_key: Secret<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_STRIPE_API_BASE.to_string(),
            secret_key: Secret::default(),
            timeout_secs: DEFAULT_STRIPE_TIMEOUT_SECS,
        }
    }
}

impl StripeConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_base = env::var("CMS_STRIPE_API_BASE").ok().unwrap_or_else(|| DEFAULT_STRIPE_API_BASE.to_string());
        let secret_key = env::var("CMS_STRIPE_SECRET_KEY").ok().unwrap_or_else(|| {
            error!("💳️ CMS_STRIPE_SECRET_KEY is not set. Calls to the payment gateway will be rejected.");
            String::default()
        });
        let timeout_secs = env::var("CMS_STRIPE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("💳️ Invalid value for CMS_STRIPE_TIMEOUT_SECS ({s}). {e}"))
                    .ok()
            })
            .unwrap_or(DEFAULT_STRIPE_TIMEOUT_SECS);
        Self { api_base, secret_key: Secret::new(secret_key), timeout_secs }
    }
}
