use std::env;

use chrono::Duration;
use cmp_common::MARKET_CURRENCY_CODE;
use log::*;
use stripe_tools::StripeConfig;

const DEFAULT_CMS_HOST: &str = "127.0.0.1";
const DEFAULT_CMS_PORT: u16 = 8360;
/// Open bids that have not been touched for this long are expired by the background worker.
const DEFAULT_BID_EXPIRY: Duration = Duration::hours(72);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The time before an untouched open bid is considered abandoned and marked as expired.
    pub bid_expiry_timeout: Duration,
    /// Payment gateway credentials and endpoints.
    pub stripe: StripeConfig,
    /// Hosted-checkout parameters shared by every session the server creates.
    pub checkout: CheckoutConfig,
    /// Notification sink endpoint. When unset, notifications are logged and dropped.
    pub notifier_url: Option<String>,
    /// Identity service base URL, used to decorate notifications with display names.
    pub identity_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CheckoutConfig {
    pub success_url: String,
    pub cancel_url: String,
    pub currency: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            success_url: "https://market.campus.example/checkout/success".to_string(),
            cancel_url: "https://market.campus.example/checkout/cancelled".to_string(),
            currency: MARKET_CURRENCY_CODE.to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CMS_HOST.to_string(),
            port: DEFAULT_CMS_PORT,
            database_url: String::default(),
            bid_expiry_timeout: DEFAULT_BID_EXPIRY,
            stripe: StripeConfig::default(),
            checkout: CheckoutConfig::default(),
            notifier_url: None,
            identity_url: None,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("CMS_HOST").ok().unwrap_or_else(|| DEFAULT_CMS_HOST.into());
        let port = env::var("CMS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for CMS_PORT. {e} Using the default, {DEFAULT_CMS_PORT}, instead."
                    );
                    DEFAULT_CMS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_CMS_PORT);
        let database_url = env::var("CMS_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ CMS_DATABASE_URL is not set. Please set it to the URL for the market database.");
            String::default()
        });
        let bid_expiry_timeout = env::var("CMS_BID_EXPIRY_HOURS")
            .map_err(|_| {
                info!(
                    "🪛️ CMS_BID_EXPIRY_HOURS is not set. Using the default value of {} hrs.",
                    DEFAULT_BID_EXPIRY.num_hours()
                )
            })
            .and_then(|s| {
                s.parse::<i64>()
                    .map(Duration::hours)
                    .map_err(|e| warn!("🪛️ Invalid configuration value for CMS_BID_EXPIRY_HOURS. {e}"))
            })
            .ok()
            .unwrap_or(DEFAULT_BID_EXPIRY);
        let stripe = StripeConfig::new_from_env_or_default();
        let checkout = CheckoutConfig::from_env_or_default();
        let notifier_url = env::var("CMS_NOTIFIER_URL").ok().filter(|s| !s.is_empty());
        if notifier_url.is_none() {
            info!("🪛️ CMS_NOTIFIER_URL is not set. User notifications will be logged and dropped.");
        }
        let identity_url = env::var("CMS_IDENTITY_URL").ok().filter(|s| !s.is_empty());
        Self { host, port, database_url, bid_expiry_timeout, stripe, checkout, notifier_url, identity_url }
    }
}

impl CheckoutConfig {
    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        let success_url = env::var("CMS_CHECKOUT_SUCCESS_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ CMS_CHECKOUT_SUCCESS_URL is not set. Using the default, {}.", defaults.success_url);
            defaults.success_url.clone()
        });
        let cancel_url = env::var("CMS_CHECKOUT_CANCEL_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ CMS_CHECKOUT_CANCEL_URL is not set. Using the default, {}.", defaults.cancel_url);
            defaults.cancel_url.clone()
        });
        let currency = env::var("CMS_CURRENCY").map(|s| s.to_uppercase()).ok().unwrap_or_else(|| {
            info!("🪛️ CMS_CURRENCY is not set. Using {MARKET_CURRENCY_CODE}.");
            MARKET_CURRENCY_CODE.to_string()
        });
        Self { success_url, cancel_url, currency }
    }
}
