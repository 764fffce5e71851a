use axum::{Extension, Form, response::Html, response::Redirect};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::password::verify_password;
use super::session::{Notice, Session};
use super::state::AuthState;
use super::types::LoginForm;
use super::utils::{normalize_email, valid_email, valid_password};
use crate::api::{handlers::error::ServiceError, views};

pub async fn login_form(Extension(session): Extension<Session>) -> Html<String> {
    views::login(session.take_notice().await)
}

/// Check credentials and authenticate the session.
///
/// Unknown emails and wrong passwords leave distinct notices (`email`,
/// `password`) for the next render of the form.
#[instrument(skip_all)]
pub async fn login(
    Extension(auth_state): Extension<Arc<AuthState>>,
    Extension(session): Extension<Session>,
    Form(form): Form<LoginForm>,
) -> Result<Redirect, ServiceError> {
    let email = normalize_email(&form.email);
    if !valid_email(&email) || !valid_password(&form.password) {
        debug!("Rejected login form with invalid input");
        return Ok(Redirect::to("/login"));
    }

    let Some(user) = auth_state.users().find_by_email(&email).await? else {
        info!("Login failed: unknown email");
        session.reject(Notice::EmailNotFound).await;
        return Ok(Redirect::to("/login"));
    };

    if verify_password(&form.password, &user.password_hash).await? {
        info!(username = %user.username, "User logged in");
        session.authenticate(user.username).await;
        Ok(Redirect::to("/members"))
    } else {
        info!(username = %user.username, "Login failed: wrong password");
        session.reject(Notice::WrongPassword).await;
        Ok(Redirect::to("/login"))
    }
}

pub async fn logout(Extension(session): Extension<Session>) -> Redirect {
    session.destroy().await;
    Redirect::to("/")
}
