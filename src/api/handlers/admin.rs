//! Admin page and role mutation.
//!
//! Every handler here runs the admin check itself; reaching `/promote` without
//! having loaded `/admin` grants nothing.

use axum::{
    Extension,
    extract::Path,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::auth::{
    AuthState, RoleChange, Session, UserType,
    principal::{Access, authorize},
    valid_username,
};
use super::error::ServiceError;
use crate::api::views;

/// Resolve the acting admin, or the response to send instead.
async fn require_admin(auth_state: &AuthState, session: &Session) -> Result<String, Response> {
    match authorize(session, auth_state.users(), UserType::Admin).await {
        Ok(Access::Granted(user)) => Ok(user.username),
        Ok(Access::Anonymous) => Err(Redirect::to("/login").into_response()),
        Ok(Access::Denied) => Err(ServiceError::Forbidden.into_response()),
        Err(err) => Err(ServiceError::Internal(err).into_response()),
    }
}

pub async fn admin(
    Extension(auth_state): Extension<Arc<AuthState>>,
    Extension(session): Extension<Session>,
) -> Response {
    if let Err(response) = require_admin(&auth_state, &session).await {
        return response;
    }
    match auth_state.users().list_all().await {
        Ok(users) => views::admin(&users).into_response(),
        Err(err) => ServiceError::Internal(err).into_response(),
    }
}

pub async fn promote(
    Extension(auth_state): Extension<Arc<AuthState>>,
    Extension(session): Extension<Session>,
    Path(username): Path<String>,
) -> Response {
    change_role(&auth_state, &session, &username, UserType::Admin).await
}

pub async fn demote(
    Extension(auth_state): Extension<Arc<AuthState>>,
    Extension(session): Extension<Session>,
    Path(username): Path<String>,
) -> Response {
    change_role(&auth_state, &session, &username, UserType::User).await
}

#[instrument(skip(auth_state, session))]
async fn change_role(
    auth_state: &AuthState,
    session: &Session,
    username: &str,
    role: UserType,
) -> Response {
    let actor = match require_admin(auth_state, session).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    if !valid_username(username) {
        debug!("Ignoring role change for invalid username");
        return Redirect::to("/admin").into_response();
    }

    match auth_state.users().set_role(username, role, &actor).await {
        Ok(RoleChange::Changed { previous }) => {
            info!(actor = %actor, target = %username, %previous, "Role changed");
        }
        Ok(RoleChange::Unchanged) => debug!("Role already set"),
        Ok(RoleChange::NotFound) => warn!(actor = %actor, "Role change for unknown user"),
        Err(err) => return ServiceError::Internal(err).into_response(),
    }
    Redirect::to("/admin").into_response()
}
