//! Server-side sessions.
//!
//! The [`manage`] middleware resolves the `clubhouse_session` cookie into a
//! [`SessionState`] before the handler runs and hands the handler a
//! [`Session`] handle through request extensions. Once the handler returns,
//! the middleware persists whatever the handler did to the session:
//!
//! - untouched sessions are not written, so anonymous visitors leave no rows;
//! - modified sessions are updated in place and keep their expiry;
//! - authentication rotates the id and starts a fresh TTL;
//! - logout deletes the record and expires the cookie.

use anyhow::{Context, Result};
use axum::{
    extract::{Request, State},
    http::{
        HeaderMap, HeaderValue,
        header::{COOKIE, InvalidHeaderValue, SET_COOKIE},
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::state::{AuthConfig, AuthState};
use super::utils::{generate_session_token, hash_session_token};
use crate::api::handlers::error::ServiceError;

pub(crate) const SESSION_COOKIE_NAME: &str = "clubhouse_session";

/// Who the session belongs to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AuthStatus {
    #[default]
    Anonymous,
    Authenticated { username: String },
}

/// Form feedback carried across a redirect and shown once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notice {
    #[serde(rename = "email")]
    EmailNotFound,
    #[serde(rename = "password")]
    WrongPassword,
    #[serde(rename = "true")]
    EmailTaken,
    #[serde(rename = "username")]
    UsernameTaken,
}

/// The document stored per session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub auth: AuthStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
}

impl SessionState {
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        match &self.auth {
            AuthStatus::Authenticated { username } => Some(username),
            AuthStatus::Anonymous => None,
        }
    }
}

// Ordered by precedence: a later, stronger change wins over a weaker one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Change {
    None,
    Modified,
    Rotated,
    Destroyed,
}

#[derive(Debug)]
struct SessionSlot {
    state: SessionState,
    change: Change,
}

impl SessionSlot {
    fn mark(&mut self, change: Change) {
        self.change = self.change.max(change);
    }
}

/// Per-request session handle, cloned into handlers via `Extension<Session>`.
#[derive(Clone, Debug)]
pub struct Session(Arc<Mutex<SessionSlot>>);

impl Session {
    fn new(state: SessionState) -> Self {
        Self(Arc::new(Mutex::new(SessionSlot {
            state,
            change: Change::None,
        })))
    }

    pub async fn state(&self) -> SessionState {
        self.0.lock().await.state.clone()
    }

    pub async fn username(&self) -> Option<String> {
        self.0.lock().await.state.username().map(str::to_string)
    }

    /// Bind the session to `username`; the session id is rotated on commit.
    pub async fn authenticate(&self, username: String) {
        let mut slot = self.0.lock().await;
        slot.state = SessionState {
            auth: AuthStatus::Authenticated { username },
            notice: None,
        };
        slot.mark(Change::Rotated);
    }

    /// Drop back to anonymous and leave a notice for the next form render.
    pub async fn reject(&self, notice: Notice) {
        let mut slot = self.0.lock().await;
        slot.state = SessionState {
            auth: AuthStatus::Anonymous,
            notice: Some(notice),
        };
        slot.mark(Change::Modified);
    }

    /// Read and clear the pending notice.
    pub async fn take_notice(&self) -> Option<Notice> {
        let mut slot = self.0.lock().await;
        let notice = slot.state.notice.take();
        if notice.is_some() {
            slot.mark(Change::Modified);
        }
        notice
    }

    pub async fn destroy(&self) {
        let mut slot = self.0.lock().await;
        slot.state = SessionState::default();
        slot.mark(Change::Destroyed);
    }

    async fn finish(&self) -> (SessionState, Change) {
        let slot = self.0.lock().await;
        (slot.state.clone(), slot.change)
    }
}

/// Session middleware, installed with `axum::middleware::from_fn_with_state`.
pub(crate) async fn manage(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let existing = match load(&auth_state, request.headers()).await {
        Ok(existing) => existing,
        Err(err) => {
            return ServiceError::Internal(err.context("failed to load session")).into_response();
        }
    };

    let session = Session::new(
        existing
            .as_ref()
            .map(|(_, state)| state.clone())
            .unwrap_or_default(),
    );
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;

    let session_hash = existing.map(|(hash, _)| hash);
    match commit(&auth_state, session_hash.as_deref(), &session).await {
        Ok(Some(cookie)) => {
            response.headers_mut().append(SET_COOKIE, cookie);
            response
        }
        Ok(None) => response,
        Err(err) => {
            ServiceError::Internal(err.context("failed to persist session")).into_response()
        }
    }
}

async fn load(
    auth_state: &AuthState,
    headers: &HeaderMap,
) -> Result<Option<(Vec<u8>, SessionState)>> {
    let Some(token) = extract_session_token(headers) else {
        return Ok(None);
    };
    let session_hash = hash_session_token(auth_state.config().session_secret(), &token)?;
    let state = auth_state.sessions().load(&session_hash).await?;
    if state.is_none() {
        debug!("Session cookie did not match a live session");
    }
    Ok(state.map(|state| (session_hash, state)))
}

/// Persist the handler's changes, returning the `Set-Cookie` value to send, if any.
async fn commit(
    auth_state: &AuthState,
    session_hash: Option<&[u8]>,
    session: &Session,
) -> Result<Option<HeaderValue>> {
    let (state, change) = session.finish().await;
    let config = auth_state.config();
    let sessions = auth_state.sessions();

    match (change, session_hash) {
        (Change::None, _) => Ok(None),
        (Change::Destroyed, hash) => {
            if let Some(hash) = hash {
                sessions.delete(hash).await?;
            }
            Ok(Some(clear_session_cookie(config)?))
        }
        (Change::Modified, Some(hash)) => {
            sessions.update(hash, &state).await?;
            Ok(None)
        }
        (Change::Rotated, hash) => {
            if let Some(hash) = hash {
                sessions.delete(hash).await?;
            }
            issue(auth_state, &state).await.map(Some)
        }
        (Change::Modified, None) => issue(auth_state, &state).await.map(Some),
    }
}

async fn issue(auth_state: &AuthState, state: &SessionState) -> Result<HeaderValue> {
    let config = auth_state.config();
    let token = generate_session_token()?;
    let session_hash = hash_session_token(config.session_secret(), &token)?;
    auth_state
        .sessions()
        .create(&session_hash, state, config.session_ttl_seconds())
        .await?;
    session_cookie(config, &token).context("failed to build session cookie")
}

/// Build an `HttpOnly` cookie carrying the session id.
pub(crate) fn session_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).context("failed to build session cookie")
}

pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == SESSION_COOKIE_NAME)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
