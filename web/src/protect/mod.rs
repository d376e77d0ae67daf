//! This module provides protection mechanisms for routes that need more than
//! an authenticated caller.
//!
//! Rules are expressed as [`Check`]s and enforced by the [`authorize`]
//! middleware before the controller runs. Ownership of individual locations is
//! enforced by the domain layer itself, since it needs the loaded resource.

pub(crate) mod users;

use crate::AppState;
use async_trait::async_trait;
use axum::{extract::Request, http::StatusCode, middleware::Next, response::IntoResponse};
use domain::auth::{self, Identity};
use domain::user::Role;
use domain::Id;
use log::*;

/// Trait representing a single authorization rule.
///
/// Implementors answer **“is the authenticated caller allowed to proceed?”**.
/// The rule receives:
/// * shared application state (`AppState`)
/// * the caller's verified [`Identity`]
/// * any additional [`Id`] parameters supplied by the caller.
#[async_trait]
pub trait Check: Send + Sync {
    async fn eval(&self, app: &AppState, identity: &Identity, args: Vec<Id>) -> bool;
}

/// Pairs a [`Check`] implementation with the concrete arguments that the rule
/// should receive when evaluated.
pub(crate) struct Predicate {
    predicate: Box<dyn Check>,
    args: Vec<Id>,
}

impl Predicate {
    pub(crate) fn new<C: Check + 'static>(predicate: C, args: Vec<Id>) -> Self {
        Self {
            predicate: Box::new(predicate),
            args,
        }
    }

    pub(crate) async fn check(&self, app_state: &AppState, identity: &Identity) -> bool {
        self.predicate
            .eval(app_state, identity, self.args.clone())
            .await
    }
}

/// Axum middleware that enforces one or more [`Predicate`]s.
///
/// Each predicate is evaluated in the order supplied; if any rule returns
/// `false` the request is aborted with **403 FORBIDDEN**.  When all rules
/// pass the wrapped handler (`next`) is executed.
pub(crate) async fn authorize(
    app_state: &AppState,
    identity: Identity,
    request: Request,
    next: Next,
    checks: Vec<Predicate>,
) -> impl IntoResponse {
    for check in checks {
        if !check.check(app_state, &identity).await {
            debug!("Request by {} rejected by protect rule", identity.subject_id);
            return (StatusCode::FORBIDDEN, "FORBIDDEN").into_response();
        }
    }
    next.run(request).await
}

pub struct UserIsAdmin;

#[async_trait]
impl Check for UserIsAdmin {
    async fn eval(&self, _app_state: &AppState, identity: &Identity, _args: Vec<Id>) -> bool {
        auth::authorize(identity, Some(Role::Admin), None).is_ok()
    }
}

pub struct UserIsNotSelf;

#[async_trait]
impl Check for UserIsNotSelf {
    async fn eval(&self, _app_state: &AppState, identity: &Identity, args: Vec<Id>) -> bool {
        args.first().is_some_and(|user_id| *user_id != identity.subject_id)
    }
}
