//! Password hashing with Argon2id.
//!
//! Parameters are fixed so every stored hash carries the same cost. Both
//! operations run on the blocking pool to keep request workers free.

use anyhow::{Context, Result, anyhow};
use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};
use rand::rngs::OsRng;
use tracing::{instrument, warn};

const MEMORY_COST_KIB: u32 = 19 * 1024;
const TIME_COST: u32 = 2;
const PARALLELISM: u32 = 1;

fn hasher() -> Result<Argon2<'static>> {
    let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, None)
        .map_err(|err| anyhow!("invalid Argon2 parameters: {err}"))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a plaintext password into a PHC string with a fresh random salt.
///
/// # Errors
/// Returns an error if hashing fails or the blocking task is cancelled.
#[instrument(skip_all)]
pub async fn hash_password(plaintext: &str) -> Result<String> {
    let plaintext = plaintext.to_owned();
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        hasher()?
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| anyhow!("failed to hash password: {err}"))
    })
    .await
    .context("password hashing task failed")?
}

/// Check a plaintext password against a stored PHC string.
///
/// An unparsable stored hash never verifies.
///
/// # Errors
/// Returns an error only if the blocking task is cancelled or the hasher cannot be built.
#[instrument(skip_all)]
pub async fn verify_password(plaintext: &str, stored_hash: &str) -> Result<bool> {
    let plaintext = plaintext.to_owned();
    let stored_hash = stored_hash.to_owned();
    tokio::task::spawn_blocking(move || {
        let Ok(parsed) = PasswordHash::new(&stored_hash) else {
            warn!("stored password hash is not a valid PHC string");
            return Ok(false);
        };
        Ok(hasher()?
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .context("password verification task failed")?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify() -> Result<()> {
        let hash = hash_password("hunter2").await?;
        assert_ne!(hash, "hunter2");
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("hunter2", &hash).await?);
        assert!(!verify_password("hunter3", &hash).await?);
        Ok(())
    }

    #[tokio::test]
    async fn same_password_gets_distinct_salts() -> Result<()> {
        let first = hash_password("same").await?;
        let second = hash_password("same").await?;
        assert_ne!(first, second);
        Ok(())
    }

    #[tokio::test]
    async fn max_length_password_verifies() -> Result<()> {
        let password = "p".repeat(20);
        let hash = hash_password(&password).await?;
        assert!(verify_password(&password, &hash).await?);
        Ok(())
    }

    #[tokio::test]
    async fn garbage_hash_never_verifies() -> Result<()> {
        assert!(!verify_password("anything", "not-a-phc-string").await?);
        assert!(!verify_password("anything", "").await?);
        Ok(())
    }
}
