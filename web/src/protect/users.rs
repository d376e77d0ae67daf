use crate::extractors::authenticated_user::AuthenticatedUser;
use crate::protect::{Predicate, UserIsAdmin, UserIsNotSelf};
use crate::AppState;
use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::IntoResponse,
};
use domain::Id;

/// Only admins may list users.
/// Intended to be given to axum::middleware::from_fn_with_state in the router
pub(crate) async fn index(
    State(app_state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    request: Request,
    next: Next,
) -> impl IntoResponse {
    let checks = vec![Predicate::new(UserIsAdmin, vec![])];
    crate::protect::authorize(&app_state, identity, request, next, checks).await
}

/// Only admins may change roles, and never their own.
pub(crate) async fn update_role(
    State(app_state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Path(user_id): Path<Id>,
    request: Request,
    next: Next,
) -> impl IntoResponse {
    let checks = vec![
        Predicate::new(UserIsAdmin, vec![]),
        Predicate::new(UserIsNotSelf, vec![user_id]),
    ];
    crate::protect::authorize(&app_state, identity, request, next, checks).await
}
