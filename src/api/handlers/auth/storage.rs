//! Credential and session storage.
//!
//! Handlers only see the [`UserStore`] and [`SessionStore`] traits. The
//! production implementation is [`PgStore`]; uniqueness of emails and
//! usernames is enforced by unique indexes, so two concurrent signups with the
//! same email cannot both be inserted.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use sqlx::{Connection, PgPool, Row, postgres::PgRow, types::Json};
use tracing::{Instrument, Span, info_span, warn};
use uuid::Uuid;

use super::session::SessionState;
use super::types::{InsertOutcome, NewUser, RoleChange, User, UserSummary, UserType};
use super::utils::{EMAIL_UNIQUE_CONSTRAINT, USERNAME_UNIQUE_CONSTRAINT, unique_violation};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

/// Persistent user records.
///
/// Lookups signal absence with `Ok(None)`; `Err` is reserved for storage faults.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn insert(&self, user: NewUser) -> Result<InsertOutcome>;

    async fn list_all(&self) -> Result<Vec<UserSummary>>;

    /// Set the role of `username`, recording `actor` in the audit log when it changes.
    async fn set_role(&self, username: &str, role: UserType, actor: &str) -> Result<RoleChange>;

    async fn ping(&self) -> Result<()>;
}

/// Server-side session documents keyed by the hashed session id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session that has not expired yet.
    async fn load(&self, session_hash: &[u8]) -> Result<Option<SessionState>>;

    async fn create(
        &self,
        session_hash: &[u8],
        state: &SessionState,
        ttl_seconds: i64,
    ) -> Result<()>;

    /// Replace the data of a live session, keeping its expiry.
    async fn update(&self, session_hash: &[u8], state: &SessionState) -> Result<()>;

    async fn delete(&self, session_hash: &[u8]) -> Result<()>;

    /// Remove expired sessions, returning how many were deleted.
    async fn purge_expired(&self) -> Result<u64>;
}

fn db_span(operation: &'static str, statement: &'static str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if they do not exist yet.
    ///
    /// # Errors
    /// Returns an error if any schema statement fails.
    pub async fn apply_schema(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("failed to acquire connection for schema setup")?;

        for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
            sqlx::query(statement)
                .execute(&mut *conn)
                .await
                .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
        }

        Ok(())
    }
}

/// Split a schema file into statements ending with `;`, skipping comments.
fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            statements.push(current.trim().to_string());
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

fn user_from_row(row: &PgRow) -> Result<User> {
    let user_type: String = row.try_get("user_type")?;
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        user_type: user_type.parse().map_err(|err: String| anyhow!(err))?,
    })
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let query =
            "SELECT id, username, email, password_hash, user_type FROM users WHERE email = $1";
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to lookup user by email")?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let query =
            "SELECT id, username, email, password_hash, user_type FROM users WHERE username = $1";
        let row = sqlx::query(query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to lookup user by username")?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn insert(&self, user: NewUser) -> Result<InsertOutcome> {
        let query = r"
            INSERT INTO users (id, username, email, password_hash, user_type)
            VALUES ($1, $2, $3, $4, 'user')
        ";
        let id = Uuid::new_v4();
        let result = sqlx::query(query)
            .bind(id)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Created(User {
                id,
                username: user.username,
                email: user.email,
                password_hash: user.password_hash,
                user_type: UserType::User,
            })),
            Err(err) => match unique_violation(&err) {
                Some(EMAIL_UNIQUE_CONSTRAINT) => Ok(InsertOutcome::EmailTaken),
                Some(USERNAME_UNIQUE_CONSTRAINT) => Ok(InsertOutcome::UsernameTaken),
                _ => Err(err).context("failed to insert user"),
            },
        }
    }

    async fn list_all(&self) -> Result<Vec<UserSummary>> {
        let query = "SELECT username, user_type FROM users ORDER BY created_at, username";
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to list users")?;

        rows.iter()
            .map(|row| -> Result<UserSummary> {
                let user_type: String = row.try_get("user_type")?;
                Ok(UserSummary {
                    username: row.try_get("username")?,
                    user_type: user_type.parse().map_err(|err: String| anyhow!(err))?,
                })
            })
            .collect()
    }

    async fn set_role(&self, username: &str, role: UserType, actor: &str) -> Result<RoleChange> {
        let mut tx = self.pool.begin().await.context("begin role transaction")?;

        let query = "SELECT user_type FROM users WHERE username = $1 FOR UPDATE";
        let current = sqlx::query(query)
            .bind(username)
            .fetch_optional(&mut *tx)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to lock user for role change")?;

        let Some(row) = current else {
            return Ok(RoleChange::NotFound);
        };
        let previous: UserType = row
            .try_get::<String, _>("user_type")?
            .parse()
            .map_err(|err: String| anyhow!(err))?;
        if previous == role {
            return Ok(RoleChange::Unchanged);
        }

        let query = "UPDATE users SET user_type = $2 WHERE username = $1";
        sqlx::query(query)
            .bind(username)
            .bind(role.as_str())
            .execute(&mut *tx)
            .instrument(db_span("UPDATE", query))
            .await
            .context("failed to update user role")?;

        let query = r"
            INSERT INTO role_audit_log (actor, target, previous_role, new_role)
            VALUES ($1, $2, $3, $4)
        ";
        sqlx::query(query)
            .bind(actor)
            .bind(username)
            .bind(previous.as_str())
            .bind(role.as_str())
            .execute(&mut *tx)
            .instrument(db_span("INSERT", query))
            .await
            .context("failed to record role change")?;

        tx.commit().await.context("commit role transaction")?;

        Ok(RoleChange::Changed { previous })
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .instrument(info_span!(
                "db.acquire",
                db.system = "postgresql",
                db.operation = "ACQUIRE"
            ))
            .await
            .context("failed to acquire database connection")?;
        conn.ping()
            .instrument(info_span!(
                "db.ping",
                db.system = "postgresql",
                db.operation = "PING"
            ))
            .await
            .context("failed to ping database")
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn load(&self, session_hash: &[u8]) -> Result<Option<SessionState>> {
        let query = "SELECT data FROM sessions WHERE session_hash = $1 AND expires_at > NOW()";
        let row = sqlx::query(query)
            .bind(session_hash)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to load session")?;

        let Some(row) = row else {
            return Ok(None);
        };
        match row.try_get::<Json<SessionState>, _>("data") {
            Ok(Json(state)) => Ok(Some(state)),
            Err(err) => {
                warn!("discarding undecodable session data: {err}");
                Ok(None)
            }
        }
    }

    async fn create(
        &self,
        session_hash: &[u8],
        state: &SessionState,
        ttl_seconds: i64,
    ) -> Result<()> {
        let query = r"
            INSERT INTO sessions (session_hash, data, expires_at)
            VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
        ";
        sqlx::query(query)
            .bind(session_hash)
            .bind(Json(state))
            .bind(ttl_seconds)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await
            .context("failed to create session")?;
        Ok(())
    }

    async fn update(&self, session_hash: &[u8], state: &SessionState) -> Result<()> {
        let query = "UPDATE sessions SET data = $2 WHERE session_hash = $1 AND expires_at > NOW()";
        sqlx::query(query)
            .bind(session_hash)
            .bind(Json(state))
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await
            .context("failed to update session")?;
        Ok(())
    }

    async fn delete(&self, session_hash: &[u8]) -> Result<()> {
        let query = "DELETE FROM sessions WHERE session_hash = $1";
        sqlx::query(query)
            .bind(session_hash)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await
            .context("failed to delete session")?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let query = "DELETE FROM sessions WHERE expires_at <= NOW()";
        let result = sqlx::query(query)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await
            .context("failed to purge expired sessions")?;
        Ok(result.rows_affected())
    }
}
