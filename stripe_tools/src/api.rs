use std::{sync::Arc, time::Duration};

use cmp_common::Money;
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::de::DeserializeOwned;

use crate::{
    config::StripeConfig,
    data_objects::{Charge, CheckoutSession, PaymentIntent},
    helpers::money_to_minor_units,
    StripeApiError,
};

/// Parameters for a new hosted checkout session.
///
/// The order id is carried twice: in the session (and intent) metadata, and as a structured label
/// inside the free-text description, so that webhook events can be routed back to the order even
/// when the gateway strips metadata from a nested object.
#[derive(Debug, Clone)]
pub struct NewCheckoutSession {
    pub order_id: i64,
    pub amount: Money,
    pub currency: String,
    pub product_name: String,
    pub description: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Clone)]
pub struct StripeApi {
    config: StripeConfig,
    client: Arc<Client>,
}

impl StripeApi {
    pub fn new(config: StripeConfig) -> Result<Self, StripeApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        let bearer = format!("Bearer {}", config.secret_key.reveal());
        let val =
            HeaderValue::from_str(bearer.as_str()).map_err(|e| StripeApiError::Initialization(e.to_string()))?;
        headers.insert("Authorization", val);
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StripeApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base)
    }

    pub async fn rest_query<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, StripeApiError> {
        let url = self.url(path);
        trace!("💳️ Sending REST query: {url}");
        let mut req = self.client.request(method, url);
        if !form.is_empty() {
            req = req.form(form);
        }
        let response = req.send().await.map_err(|e| StripeApiError::Transport(e.to_string()))?;
        if response.status().is_success() {
            trace!("💳️ REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| StripeApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| StripeApiError::Transport(e.to_string()))?;
            Err(StripeApiError::QueryError { status, message })
        }
    }

    /// Creates a hosted checkout session for a single order and returns the session, including
    /// the payment page URL and the freshly minted payment intent id.
    pub async fn create_checkout_session(&self, new: NewCheckoutSession) -> Result<CheckoutSession, StripeApiError> {
        let unit_amount = money_to_minor_units(new.amount, &new.currency);
        let order_id = new.order_id.to_string();
        let form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), new.success_url),
            ("cancel_url".to_string(), new.cancel_url),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("line_items[0][price_data][currency]".to_string(), new.currency.to_ascii_lowercase()),
            ("line_items[0][price_data][unit_amount]".to_string(), unit_amount.to_string()),
            ("line_items[0][price_data][product_data][name]".to_string(), new.product_name),
            ("metadata[order_id]".to_string(), order_id.clone()),
            ("payment_intent_data[metadata][order_id]".to_string(), order_id.clone()),
            ("payment_intent_data[description]".to_string(), new.description),
        ];
        debug!("💳️ Creating checkout session for order #{order_id}");
        let session = self.rest_query::<CheckoutSession>(Method::POST, "/checkout/sessions", &form).await?;
        info!("💳️ Checkout session {} created for order #{order_id}", session.id);
        Ok(session)
    }

    pub async fn get_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent, StripeApiError> {
        let path = format!("/payment_intents/{intent_id}");
        debug!("💳️ Fetching payment intent {intent_id}");
        self.rest_query::<PaymentIntent>(Method::GET, &path, &[]).await
    }

    pub async fn get_charge(&self, charge_id: &str) -> Result<Charge, StripeApiError> {
        let path = format!("/charges/{charge_id}");
        debug!("💳️ Fetching charge {charge_id}");
        self.rest_query::<Charge>(Method::GET, &path, &[]).await
    }

    /// Resolves the receipt URL for an intent by following its latest charge.
    ///
    /// Receipt URLs arrive on the charge, often after the intent has already succeeded, so callers
    /// treat a `None` or an error here as "try again on the next event".
    pub async fn receipt_url_for_intent(&self, intent_id: &str) -> Result<Option<String>, StripeApiError> {
        let intent = self.get_payment_intent(intent_id).await?;
        let Some(charge_id) = intent.latest_charge else {
            return Ok(None);
        };
        let charge = self.get_charge(&charge_id).await?;
        Ok(charge.receipt_url)
    }
}
