use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use campus_market_engine::MarketplaceError;
use stripe_tools::StripeApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Payload deserialization error")]
    CouldNotDeserializePayload,
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The request is invalid. {0}")]
    ValidationError(String),
    #[error("The request conflicts with the current state. {0}")]
    Conflict(String),
    #[error("The payment gateway could not complete the request. {0}")]
    GatewayError(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::CouldNotDeserializePayload => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingUserId => StatusCode::UNAUTHORIZED,
                AuthError::InvalidUserId(_) => StatusCode::UNAUTHORIZED,
                AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
            },
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            // Gateway failures are retryable from the client's point of view: the order is
            // still pending and a fresh checkout attempt is safe.
            Self::GatewayError(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No authenticated user id was supplied with the request.")]
    MissingUserId,
    #[error("The supplied user id is not valid. {0}")]
    InvalidUserId(String),
    #[error("Insufficient permissions. {0}")]
    Forbidden(String),
}

impl From<MarketplaceError> for ServerError {
    fn from(e: MarketplaceError) -> Self {
        use MarketplaceError::*;
        match &e {
            BiddingClosed(_) | SelfBid(_) | BidBelowFloor { .. } | InvalidBidTransition { .. } | EmptyCart(_) => {
                Self::ValidationError(e.to_string())
            },
            ListingNotFound(_) | BidNotFound(_) | OrderNotFound(_) | PaymentNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
            NotListingSeller { .. } | NotBidOwner { .. } => {
                Self::AuthenticationError(AuthError::Forbidden(e.to_string()))
            },
            BidNotOpen { .. }
            | BidNotAccepted { .. }
            | NoOpenBids(_)
            | ListingUnavailable(_)
            | OrderNotPending(_)
            | PaymentCollision(_) => Self::Conflict(e.to_string()),
            DatabaseError(msg) => Self::BackendError(format!("Database error: {msg}")),
        }
    }
}

impl From<StripeApiError> for ServerError {
    fn from(e: StripeApiError) -> Self {
        Self::GatewayError(e.to_string())
    }
}
