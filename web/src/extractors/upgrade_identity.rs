use crate::{AppState, Error};
use axum::{
    extract::{FromRequestParts, Query},
    http::{header::AUTHORIZATION, request::Parts},
};
use domain::auth::{bearer_token, Identity};
use log::*;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct UpgradeParams {
    token: Option<String>,
}

/// The identity presented on a WebSocket upgrade request.
///
/// Browsers cannot set headers on an upgrade, so besides the `Authorization`
/// header the credential may arrive as the `token` query parameter. Must be
/// extracted before `WebSocketUpgrade` so a refused credential never opens a
/// transport.
pub(crate) struct UpgradeIdentity(pub Identity);

impl FromRequestParts<AppState> for UpgradeIdentity {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        app_state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let from_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .map(str::to_owned);
        let token = match from_header {
            Some(token) => Some(token),
            None => Query::<UpgradeParams>::try_from_uri(&parts.uri)
                .map(|Query(params)| params.token)
                .unwrap_or_default(),
        };

        match app_state.auth_gate.authenticate(token.as_deref()).await {
            Ok(identity) => Ok(UpgradeIdentity(identity)),
            Err(e) => {
                warn!("Refused WebSocket upgrade: {e}");
                Err(e.into())
            }
        }
    }
}
