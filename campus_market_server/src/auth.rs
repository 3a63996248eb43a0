//! Actor identity extraction.
//!
//! Authentication itself is not this server's job: the campus SSO reverse proxy authenticates
//! every session and injects the user's id into [`USER_ID_HEADER`] before forwarding the
//! request. This module only lifts that header into a typed extractor, so handlers can declare
//! an [`AuthenticatedUser`] parameter and never touch raw headers. Requests arriving without
//! the header (i.e. not via the proxy) are rejected with 401.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpRequest};

use crate::errors::{AuthError, ServerError};

pub const USER_ID_HEADER: &str = "x-cms-user-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: i64,
}

impl FromRequest for AuthenticatedUser {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = match req.headers().get(USER_ID_HEADER) {
            None => Err(ServerError::AuthenticationError(AuthError::MissingUserId)),
            Some(value) => value
                .to_str()
                .map_err(|e| ServerError::AuthenticationError(AuthError::InvalidUserId(e.to_string())))
                .and_then(|s| {
                    s.parse::<i64>()
                        .map(|id| AuthenticatedUser { id })
                        .map_err(|e| ServerError::AuthenticationError(AuthError::InvalidUserId(e.to_string())))
                }),
        };
        ready(result)
    }
}
