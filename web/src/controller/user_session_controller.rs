use crate::controller::{blocking, ApiResponse};
use crate::{AppState, Error};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use domain::user::Credentials;
use log::*;
use serde_json::json;

/// Logs the user into the platform and returns a new bearer credential.
///
/// Pass the returned token back to the server for every API call, and as the
/// `token` query parameter when opening the WebSocket, e.g.:
/// curl -v --header "Authorization: Bearer <token>" --request GET http://localhost:4000/locations
#[utoipa::path(
    post,
    path = "/login",
    request_body(content = domain::user::Credentials, content_type = "application/json"),
    responses(
        (status = 200, description = "Logs in and returns a bearer credential"),
        (status = 401, description = "Unauthorized"),
        (status = 405, description = "Method not allowed")
    )
)]
pub async fn login(
    State(app_state): State<AppState>,
    Json(creds): Json<Credentials>,
) -> Result<impl IntoResponse, Error> {
    let directory = app_state.directory.clone();
    let email = creds.email.clone();

    let user = blocking(move || directory.verify_credentials(&creds))
        .await
        .inspect_err(|_| warn!("Authentication failed for {email:?}"))?;

    let credential = app_state.auth_gate.codec().issue(user.id, user.role)?;
    info!("User {} logged in", user.id);

    let user_session_json = json!({
        "email": user.email,
        "token": credential.token,
        "user_id": user.id,
        "role": user.role,
    });

    Ok(Json(ApiResponse::new(
        StatusCode::OK.into(),
        user_session_json,
    )))
}
