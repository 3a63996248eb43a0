use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum StripeApiError {
    #[error("Could not initialize the Stripe API client. {0}")]
    Initialization(String),
    #[error("Error sending request to Stripe. {0}")]
    Transport(String),
    #[error("Stripe returned an error response. Status: {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Could not deserialize Stripe response. {0}")]
    JsonError(String),
    #[error("Stripe response was missing an expected field: {0}")]
    MissingField(String),
}
