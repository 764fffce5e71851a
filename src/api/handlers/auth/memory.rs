//! In-memory stores for handler tests.

use anyhow::Result;
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};
use uuid::Uuid;

use super::session::SessionState;
use super::storage::{SessionStore, UserStore};
use super::types::{InsertOutcome, NewUser, RoleChange, User, UserSummary, UserType};

/// One audit entry: actor, target, previous role, new role.
pub(crate) type AuditEntry = (String, String, UserType, UserType);

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    sessions: HashMap<Vec<u8>, (SessionState, Instant)>,
    audit: Vec<AuditEntry>,
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    fn with<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> T {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut inner)
    }

    pub(crate) fn user(&self, username: &str) -> Option<User> {
        self.with(|inner| inner.users.iter().find(|u| u.username == username).cloned())
    }

    pub(crate) fn user_count(&self) -> usize {
        self.with(|inner| inner.users.len())
    }

    pub(crate) fn session_count(&self) -> usize {
        self.with(|inner| inner.sessions.len())
    }

    pub(crate) fn audit_log(&self) -> Vec<AuditEntry> {
        self.with(|inner| inner.audit.clone())
    }

    /// Delete a user behind the back of any live session.
    pub(crate) fn remove_user(&self, username: &str) {
        self.with(|inner| inner.users.retain(|u| u.username != username));
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.with(|inner| inner.users.iter().find(|u| u.email == email).cloned()))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self.user(username))
    }

    async fn insert(&self, user: NewUser) -> Result<InsertOutcome> {
        Ok(self.with(|inner| {
            if inner.users.iter().any(|u| u.email == user.email) {
                return InsertOutcome::EmailTaken;
            }
            if inner.users.iter().any(|u| u.username == user.username) {
                return InsertOutcome::UsernameTaken;
            }
            let created = User {
                id: Uuid::new_v4(),
                username: user.username,
                email: user.email,
                password_hash: user.password_hash,
                user_type: UserType::User,
            };
            inner.users.push(created.clone());
            InsertOutcome::Created(created)
        }))
    }

    async fn list_all(&self) -> Result<Vec<UserSummary>> {
        Ok(self.with(|inner| {
            inner
                .users
                .iter()
                .map(|u| UserSummary {
                    username: u.username.clone(),
                    user_type: u.user_type,
                })
                .collect()
        }))
    }

    async fn set_role(&self, username: &str, role: UserType, actor: &str) -> Result<RoleChange> {
        Ok(self.with(|inner| {
            let Some(user) = inner.users.iter_mut().find(|u| u.username == username) else {
                return RoleChange::NotFound;
            };
            let previous = user.user_type;
            if previous == role {
                return RoleChange::Unchanged;
            }
            user.user_type = role;
            inner
                .audit
                .push((actor.to_string(), username.to_string(), previous, role));
            RoleChange::Changed { previous }
        }))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, session_hash: &[u8]) -> Result<Option<SessionState>> {
        let now = Instant::now();
        Ok(self.with(|inner| {
            inner
                .sessions
                .get(session_hash)
                .filter(|(_, expires_at)| *expires_at > now)
                .map(|(state, _)| state.clone())
        }))
    }

    async fn create(
        &self,
        session_hash: &[u8],
        state: &SessionState,
        ttl_seconds: i64,
    ) -> Result<()> {
        let ttl = Duration::from_secs(u64::try_from(ttl_seconds).unwrap_or(0));
        let expires_at = Instant::now() + ttl;
        self.with(|inner| {
            inner
                .sessions
                .insert(session_hash.to_vec(), (state.clone(), expires_at));
        });
        Ok(())
    }

    async fn update(&self, session_hash: &[u8], state: &SessionState) -> Result<()> {
        let now = Instant::now();
        self.with(|inner| {
            if let Some((current, expires_at)) = inner.sessions.get_mut(session_hash)
                && *expires_at > now
            {
                *current = state.clone();
            }
        });
        Ok(())
    }

    async fn delete(&self, session_hash: &[u8]) -> Result<()> {
        self.with(|inner| inner.sessions.remove(session_hash));
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let now = Instant::now();
        Ok(self.with(|inner| {
            let before = inner.sessions.len();
            inner.sessions.retain(|_, (_, expires_at)| *expires_at > now);
            (before - inner.sessions.len()) as u64
        }))
    }
}
