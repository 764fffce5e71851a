//! Small helpers for input validation and session id handling.

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::{RngCore, rngs::OsRng};
use regex::Regex;
use sha2::Sha256;

const MAX_USERNAME_LEN: usize = 20;
const MAX_PASSWORD_LEN: usize = 20;
const MAX_EMAIL_LEN: usize = 254;

pub(crate) const EMAIL_UNIQUE_CONSTRAINT: &str = "users_email_key";
pub(crate) const USERNAME_UNIQUE_CONSTRAINT: &str = "users_username_key";

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// 1-20 ASCII letters or digits. Also used for the role-change path parameter.
pub(crate) fn valid_username(username: &str) -> bool {
    username.len() <= MAX_USERNAME_LEN
        && Regex::new(r"^[A-Za-z0-9]+$").is_ok_and(|re| re.is_match(username))
}

/// `local@label.tld` on already-normalized input, with at least two domain
/// segments and a `.com` or `.net` top-level domain.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    email_normalized.len() <= MAX_EMAIL_LEN
        && Regex::new(
            r"^[a-z0-9.!#$%&'*+/=?^_`{|}~-]+@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+(?:com|net)$",
        )
        .is_ok_and(|re| re.is_match(email_normalized))
}

pub(crate) fn valid_password(password: &str) -> bool {
    let len = password.chars().count();
    (1..=MAX_PASSWORD_LEN).contains(&len)
}

/// Create a new session id for the cookie.
/// The raw value is only returned to set the cookie; the database stores a keyed hash.
pub(crate) fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// HMAC-SHA256 of a session id under the server secret.
/// The result is the storage key; a leaked sessions table cannot be replayed as cookies.
pub(crate) fn hash_session_token(secret: &[u8], token: &str) -> Result<Vec<u8>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret)
        .map_err(|_| anyhow!("invalid session secret"))?;
    mac.update(token.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Name of the unique constraint a failed insert tripped over, if any.
pub(crate) fn unique_violation(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db_err)
            if db_err.code().is_some_and(|code| code.as_ref() == "23505") =>
        {
            Some(db_err.constraint().unwrap_or_default())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_username_accepts_alphanumeric_up_to_twenty() {
        assert!(valid_username("alice"));
        assert!(valid_username("Bob42"));
        assert!(valid_username(&"a".repeat(20)));
    }

    #[test]
    fn valid_username_rejects_bad_input() {
        assert!(!valid_username(""));
        assert!(!valid_username(&"a".repeat(21)));
        assert!(!valid_username("alice smith"));
        assert!(!valid_username("alice_1"));
        assert!(!valid_username("ålice"));
    }

    #[test]
    fn valid_email_accepts_allowed_tlds() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@mail.example.net"));
    }

    #[test]
    fn valid_email_rejects_other_shapes() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-domain@"));
        assert!(!valid_email("a@example.org"));
        assert!(!valid_email("a@com"));
        assert!(!valid_email("a@-bad.com"));
        assert!(!valid_email(""));
    }

    #[test]
    fn valid_password_bounds() {
        assert!(valid_password("x"));
        assert!(valid_password(&"p".repeat(20)));
        assert!(!valid_password(""));
        assert!(!valid_password(&"p".repeat(21)));
    }

    #[test]
    fn generate_session_token_is_32_random_bytes() -> Result<()> {
        let first = generate_session_token()?;
        let second = generate_session_token()?;
        assert_ne!(first, second);
        let decoded = URL_SAFE_NO_PAD.decode(first.as_bytes())?;
        assert_eq!(decoded.len(), 32);
        Ok(())
    }

    #[test]
    fn hash_session_token_is_keyed_and_stable() -> Result<()> {
        let first = hash_session_token(b"secret-a", "token")?;
        let again = hash_session_token(b"secret-a", "token")?;
        let other_key = hash_session_token(b"secret-b", "token")?;
        let other_token = hash_session_token(b"secret-a", "other")?;
        assert_eq!(first, again);
        assert_eq!(first.len(), 32);
        assert_ne!(first, other_key);
        assert_ne!(first, other_token);
        Ok(())
    }

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
        constraint: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &'static str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn constraint(&self) -> Option<&str> {
            self.constraint
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn unique_violation_reports_constraint() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
            constraint: Some(EMAIL_UNIQUE_CONSTRAINT),
        }));
        assert_eq!(unique_violation(&err), Some(EMAIL_UNIQUE_CONSTRAINT));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("99999"),
            constraint: Some(EMAIL_UNIQUE_CONSTRAINT),
        }));
        assert_eq!(unique_violation(&err), None);

        assert_eq!(unique_violation(&sqlx::Error::RowNotFound), None);
    }
}
