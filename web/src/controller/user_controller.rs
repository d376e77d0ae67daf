use crate::controller::{blocking, ApiResponse};
use crate::extractors::authenticated_user::AuthenticatedUser;
use crate::params::user::UpdateRoleParams;
use crate::{AppState, Error};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use domain::user::{self as UserApi, NewUser, User};
use domain::Id;
use log::*;

/// CREATE a new User
///
/// Open registration. Requesting the admin role requires an admin bearer credential.
#[utoipa::path(
    post,
    path = "/users",
    request_body = domain::user::NewUser,
    responses(
        (status = 201, description = "Successfully created a new User", body = domain::user::User),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Email already registered"),
        (status = 422, description = "Unprocessable Entity")
    ),
    security(
        (),
        ("bearer_auth" = [])
    )
)]
pub async fn create(
    State(app_state): State<AppState>,
    caller: Option<AuthenticatedUser>,
    Json(new_user): Json<NewUser>,
) -> Result<impl IntoResponse, Error> {
    debug!("CREATE new User with email {:?}", new_user.email);

    let requested_by = caller.map(|AuthenticatedUser(identity)| identity);
    let directory = app_state.directory.clone();
    let publisher = app_state.event_publisher.clone();

    let user: User = blocking(move || {
        UserApi::register(&directory, &publisher, new_user, requested_by.as_ref())
    })
    .await?;

    debug!("Newly created User {}", user.id);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(StatusCode::CREATED.into(), user)),
    ))
}

/// GET all Users
#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "Successfully retrieved all Users", body = [domain::user::User]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn index(State(app_state): State<AppState>) -> Result<impl IntoResponse, Error> {
    let users = app_state.directory.list();
    debug!("Found {} Users", users.len());

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), users)))
}

/// UPDATE a User's role
#[utoipa::path(
    put,
    path = "/users/{id}/role",
    params(
        ("id" = Uuid, Path, description = "Id of the User whose role changes"),
    ),
    request_body = UpdateRoleParams,
    responses(
        (status = 200, description = "Successfully changed the User's role", body = domain::user::User),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_role(
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
    Json(params): Json<UpdateRoleParams>,
) -> Result<impl IntoResponse, Error> {
    let user = UserApi::change_role(
        &app_state.directory,
        &app_state.event_publisher,
        id,
        params.role,
    )?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), user)))
}
