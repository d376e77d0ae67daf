use crate::{AppState, Error};
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use domain::auth::{bearer_token, Identity};
use domain::error::Error as DomainError;
use log::*;

/// The caller's identity, established from an `Authorization: Bearer` header.
///
/// Rejects with 401 before the handler runs when the header is missing or the
/// credential does not verify. Use `Option<AuthenticatedUser>` on routes that
/// also serve anonymous callers: a missing header yields `None`, a bad one is
/// still rejected.
pub(crate) struct AuthenticatedUser(pub Identity);

fn authorization_header(parts: &Parts) -> Option<Result<&str, Error>> {
    let value = parts.headers.get(AUTHORIZATION)?;
    let token = value
        .to_str()
        .ok()
        .and_then(bearer_token)
        .ok_or_else(|| {
            debug!("Malformed Authorization header");
            Error::from(DomainError::unauthenticated())
        });
    Some(token)
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        app_state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = authorization_header(parts).transpose()?;
        let identity = app_state.auth_gate.authenticate(token).await?;
        Ok(AuthenticatedUser(identity))
    }
}

impl OptionalFromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        app_state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        match authorization_header(parts) {
            None => Ok(None),
            Some(token) => {
                let identity = app_state.auth_gate.authenticate(Some(token?)).await?;
                Ok(Some(AuthenticatedUser(identity)))
            }
        }
    }
}
