//! Account creation.
//!
//! Flow Overview:
//! 1) Validate the form shape; invalid input goes back to `/signup` untouched.
//! 2) Look up the normalized email and reject known ones with a notice.
//! 3) Hash the password and insert the user. The unique indexes have the final
//!    word, so a concurrent signup with the same email still loses here.
//! 4) Authenticate the session and continue to `/members`.

use axum::{Extension, Form, response::Html, response::Redirect};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::password::hash_password;
use super::session::{Notice, Session};
use super::state::AuthState;
use super::types::{InsertOutcome, NewUser, SignupForm};
use super::utils::{normalize_email, valid_email, valid_password, valid_username};
use crate::api::{handlers::error::ServiceError, views};

pub async fn signup_form(Extension(session): Extension<Session>) -> Html<String> {
    views::signup(session.take_notice().await)
}

#[instrument(skip_all)]
pub async fn signup(
    Extension(auth_state): Extension<Arc<AuthState>>,
    Extension(session): Extension<Session>,
    Form(form): Form<SignupForm>,
) -> Result<Redirect, ServiceError> {
    let email = normalize_email(&form.email);
    if !valid_username(&form.username) || !valid_email(&email) || !valid_password(&form.password)
    {
        debug!("Rejected signup form with invalid input");
        return Ok(Redirect::to("/signup"));
    }

    let users = auth_state.users();
    if users.find_by_email(&email).await?.is_some() {
        info!("Signup rejected: email already registered");
        session.reject(Notice::EmailTaken).await;
        return Ok(Redirect::to("/signup"));
    }

    let password_hash = hash_password(&form.password).await?;
    let outcome = users
        .insert(NewUser {
            username: form.username,
            email,
            password_hash,
        })
        .await?;

    match outcome {
        InsertOutcome::Created(user) => {
            info!(username = %user.username, "User signed up");
            session.authenticate(user.username).await;
            Ok(Redirect::to("/members"))
        }
        InsertOutcome::EmailTaken => {
            info!("Signup rejected: email registered concurrently");
            session.reject(Notice::EmailTaken).await;
            Ok(Redirect::to("/signup"))
        }
        InsertOutcome::UsernameTaken => {
            info!("Signup rejected: username already taken");
            session.reject(Notice::UsernameTaken).await;
            Ok(Redirect::to("/signup"))
        }
    }
}
