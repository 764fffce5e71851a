//! Authentication, sessions and role checks.
//!
//! Credentials are an email plus a password hashed with Argon2id. A successful
//! signup or login binds the server-side session to the username and rotates
//! the session id. Failed attempts leave the session anonymous with a one-shot
//! [`Notice`] that the next form render consumes.
//!
//! Roles are not cached in the session: [`principal::authorize`] reads the
//! user record on every gated request and fails closed when it is missing.

mod login;
#[cfg(test)]
mod memory;
mod password;
pub(crate) mod principal;
pub(crate) mod session;
mod signup;
mod state;
mod storage;
pub(crate) mod types;
mod utils;

pub use login::{login, login_form, logout};
pub use session::{AuthStatus, Notice, Session, SessionState};
pub use signup::{signup, signup_form};
pub use state::{AuthConfig, AuthState};
pub use storage::{PgStore, SessionStore, UserStore};
pub use types::{InsertOutcome, NewUser, RoleChange, User, UserSummary, UserType};

#[cfg(test)]
pub(crate) use memory::MemoryStore;
pub(crate) use utils::valid_username;
#[cfg(test)]
pub(crate) use utils::hash_session_token;
