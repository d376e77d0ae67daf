use crate::controller::ApiResponse;
use crate::extractors::authenticated_user::AuthenticatedUser;
use crate::{AppState, Error};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use domain::location::{self as LocationApi, LocationPatch, NewLocation};
use domain::Id;
use log::*;
use serde_json::json;

/// CREATE a new Location owned by the caller
#[utoipa::path(
    post,
    path = "/locations",
    request_body = domain::location::NewLocation,
    responses(
        (status = 201, description = "Successfully created a new Location", body = domain::location::Location),
        (status = 401, description = "Unauthorized"),
        (status = 422, description = "Unprocessable Entity")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create(
    AuthenticatedUser(identity): AuthenticatedUser,
    State(app_state): State<AppState>,
    Json(new_location): Json<NewLocation>,
) -> Result<impl IntoResponse, Error> {
    debug!("CREATE new Location from: {new_location:?}");

    let location = LocationApi::create(
        &app_state.locations,
        &app_state.event_publisher,
        &identity,
        new_location,
    )?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(StatusCode::CREATED.into(), location)),
    ))
}

/// GET all Locations
#[utoipa::path(
    get,
    path = "/locations",
    responses(
        (status = 200, description = "Successfully retrieved all Locations", body = [domain::location::Location]),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn index(
    AuthenticatedUser(_identity): AuthenticatedUser,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, Error> {
    let locations = LocationApi::list(&app_state.locations);
    debug!("Found {} Locations", locations.len());

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), locations)))
}

/// GET a particular Location specified by its id.
#[utoipa::path(
    get,
    path = "/locations/{id}",
    params(
        ("id" = Uuid, Path, description = "Location id to retrieve")
    ),
    responses(
        (status = 200, description = "Successfully retrieved a Location", body = domain::location::Location),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Location not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn read(
    AuthenticatedUser(_identity): AuthenticatedUser,
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<impl IntoResponse, Error> {
    let location = LocationApi::find_by_id(&app_state.locations, id)?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), location)))
}

/// UPDATE a Location. Only its owner or an admin may do this.
#[utoipa::path(
    patch,
    path = "/locations/{id}",
    params(
        ("id" = Uuid, Path, description = "Id of Location to update"),
    ),
    request_body = domain::location::LocationPatch,
    responses(
        (status = 200, description = "Successfully updated the Location", body = domain::location::Location),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Location not found"),
        (status = 422, description = "Unprocessable Entity")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update(
    AuthenticatedUser(identity): AuthenticatedUser,
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
    Json(patch): Json<LocationPatch>,
) -> Result<impl IntoResponse, Error> {
    debug!("UPDATE Location {id} with: {patch:?}");

    let location = LocationApi::update(
        &app_state.locations,
        &app_state.event_publisher,
        &identity,
        id,
        patch,
    )?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), location)))
}

/// DELETE a Location. Only its owner or an admin may do this.
#[utoipa::path(
    delete,
    path = "/locations/{id}",
    params(
        ("id" = Uuid, Path, description = "Id of Location to delete"),
    ),
    responses(
        (status = 200, description = "Successfully deleted the Location"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Location not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete(
    AuthenticatedUser(identity): AuthenticatedUser,
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<impl IntoResponse, Error> {
    let location = LocationApi::delete(
        &app_state.locations,
        &app_state.event_publisher,
        &identity,
        id,
    )?;

    Ok(Json(ApiResponse::new(
        StatusCode::OK.into(),
        json!({"location": location.city, "status": "deleted"}),
    )))
}
