//! Role checks for gated routes.
//!
//! The session only says who the caller is. The role is read from the user
//! record on every check so a demotion applies to sessions that already exist.

use anyhow::Result;
use tracing::warn;

use super::session::Session;
use super::storage::UserStore;
use super::types::{User, UserType};

/// Result of an authorization check.
#[derive(Debug)]
pub enum Access {
    Granted(User),
    /// No authenticated session; callers send the visitor to `/login`.
    Anonymous,
    Denied,
}

/// Check that the session's user currently holds `required`.
///
/// A session whose user record no longer exists is denied.
///
/// # Errors
/// Returns an error only when the user store fails.
pub async fn authorize(
    session: &Session,
    users: &dyn UserStore,
    required: UserType,
) -> Result<Access> {
    let Some(username) = session.username().await else {
        return Ok(Access::Anonymous);
    };

    match users.find_by_username(&username).await? {
        Some(user) if user.user_type == required => Ok(Access::Granted(user)),
        Some(_) => Ok(Access::Denied),
        None => {
            warn!(username = %username, "Authenticated session refers to a missing user");
            Ok(Access::Denied)
        }
    }
}
