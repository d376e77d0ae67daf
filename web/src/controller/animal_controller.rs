use crate::controller::ApiResponse;
use crate::extractors::authenticated_user::AuthenticatedUser;
use crate::{AppState, Error};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use domain::animal::{self as AnimalApi, AnimalPatch, NewAnimal};
use domain::Id;
use log::*;
use serde_json::json;

/// CREATE a new lost or found Animal report owned by the caller
#[utoipa::path(
    post,
    path = "/animals",
    request_body = domain::animal::NewAnimal,
    responses(
        (status = 201, description = "Successfully created a new Animal report", body = domain::animal::Animal),
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
    Json(new_animal): Json<NewAnimal>,
) -> Result<impl IntoResponse, Error> {
    debug!("CREATE new Animal from: {new_animal:?}");

    let animal = AnimalApi::create(
        &app_state.animals,
        &app_state.locations,
        &app_state.event_publisher,
        &identity,
        new_animal,
    )?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(StatusCode::CREATED.into(), animal)),
    ))
}

/// GET all Animal reports, most recent first
#[utoipa::path(
    get,
    path = "/animals",
    responses(
        (status = 200, description = "Successfully retrieved all Animal reports", body = [domain::animal::Animal]),
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
    let animals = AnimalApi::list(&app_state.animals);
    debug!("Found {} Animals", animals.len());

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), animals)))
}

/// GET a particular Animal report specified by its id.
#[utoipa::path(
    get,
    path = "/animals/{id}",
    params(
        ("id" = Uuid, Path, description = "Animal id to retrieve")
    ),
    responses(
        (status = 200, description = "Successfully retrieved an Animal report", body = domain::animal::Animal),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Animal not found")
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
    let animal = AnimalApi::find_by_id(&app_state.animals, id)?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), animal)))
}

/// UPDATE an Animal report. Only its owner or an admin may do this.
#[utoipa::path(
    patch,
    path = "/animals/{id}",
    params(
        ("id" = Uuid, Path, description = "Id of Animal to update"),
    ),
    request_body = domain::animal::AnimalPatch,
    responses(
        (status = 200, description = "Successfully updated the Animal report", body = domain::animal::Animal),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Animal not found"),
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
    Json(patch): Json<AnimalPatch>,
) -> Result<impl IntoResponse, Error> {
    debug!("UPDATE Animal {id} with: {patch:?}");

    let animal = AnimalApi::update(
        &app_state.animals,
        &app_state.locations,
        &app_state.event_publisher,
        &identity,
        id,
        patch,
    )?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), animal)))
}

/// DELETE an Animal report. Only its owner or an admin may do this.
#[utoipa::path(
    delete,
    path = "/animals/{id}",
    params(
        ("id" = Uuid, Path, description = "Id of Animal to delete"),
    ),
    responses(
        (status = 200, description = "Successfully deleted the Animal report"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Animal not found")
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
    let animal = AnimalApi::delete(
        &app_state.animals,
        &app_state.event_publisher,
        &identity,
        id,
    )?;

    Ok(Json(ApiResponse::new(
        StatusCode::OK.into(),
        json!({"animal": animal.name, "status": "deleted"}),
    )))
}
