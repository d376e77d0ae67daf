use crate::{controller::health_check_controller, params, protect, websocket, AppState};
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};

use crate::controller::{
    animal_controller, location_controller, user_controller, user_session_controller,
};

use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI document. To be a part
// of the rendered document, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Qroket Platform API"
        ),
        paths(
            health_check_controller::health_check,
            animal_controller::create,
            animal_controller::index,
            animal_controller::read,
            animal_controller::update,
            animal_controller::delete,
            location_controller::create,
            location_controller::index,
            location_controller::read,
            location_controller::update,
            location_controller::delete,
            user_controller::create,
            user_controller::index,
            user_controller::update_role,
            user_session_controller::login,
        ),
        components(
            schemas(
                domain::animal::Animal,
                domain::animal::AnimalKind,
                domain::animal::AnimalPatch,
                domain::animal::NewAnimal,
                domain::location::Location,
                domain::location::NewLocation,
                domain::location::LocationPatch,
                domain::user::Credentials,
                domain::user::NewUser,
                domain::user::Role,
                domain::user::User,
                params::user::UpdateRoleParams,
            )
        ),
        modifiers(&SecurityAddon),
        tags(
            (name = "qroket_platform", description = "Qroket lost and found animals API with live WebSocket updates")
        )
    )]
struct ApiDoc;

struct SecurityAddon;

// Defines our bearer credential authentication requirement for gaining access to our
// API endpoints for OpenAPI.
impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Token returned from a successful POST /login"))
                        .build(),
                ),
            )
        }
    }
}

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(animal_routes(app_state.clone()))
        .merge(location_routes(app_state.clone()))
        .merge(user_routes(app_state.clone()))
        .merge(user_session_routes(app_state.clone()))
        .merge(ws_routes(app_state))
        .merge(RapiDoc::with_openapi("/api-docs/openapi2.json", ApiDoc::openapi()).path("/rapidoc"))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn animal_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/animals",
            post(animal_controller::create).get(animal_controller::index),
        )
        .route(
            "/animals/{id}",
            get(animal_controller::read)
                .patch(animal_controller::update)
                .delete(animal_controller::delete),
        )
        .with_state(app_state)
}

fn location_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/locations",
            post(location_controller::create).get(location_controller::index),
        )
        .route(
            "/locations/{id}",
            get(location_controller::read)
                .patch(location_controller::update)
                .delete(location_controller::delete),
        )
        .with_state(app_state)
}

fn user_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/users", post(user_controller::create))
        .merge(
            // GET /users
            Router::new()
                .route("/users", get(user_controller::index))
                .route_layer(from_fn_with_state(app_state.clone(), protect::users::index)),
        )
        .merge(
            // PUT /users/{id}/role
            Router::new()
                .route("/users/{id}/role", put(user_controller::update_role))
                .route_layer(from_fn_with_state(
                    app_state.clone(),
                    protect::users::update_role,
                )),
        )
        .with_state(app_state)
}

fn user_session_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/login", post(user_session_controller::login))
        // Older clients still log in through /auth.
        .route("/auth", post(user_session_controller::login))
        .with_state(app_state)
}

fn ws_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/ws", get(websocket::handler::ws_handler))
        .with_state(app_state)
}
