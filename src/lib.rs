//! # Clubhouse (members-only site)
//!
//! `clubhouse` serves a small members area: visitors sign up or log in with an
//! email and password, members see a members-only page, and administrators can
//! promote or demote other users.
//!
//! ## Sessions
//!
//! Sessions are server side. The browser only holds an opaque random id in the
//! `clubhouse_session` cookie; the database stores an HMAC of that id keyed
//! with the configured session secret, together with a JSON document holding
//! the authentication state and a one-shot notice used to report form errors
//! across redirects.
//!
//! ## Roles
//!
//! Every user is either a `user` or an `admin`. The role lives on the user
//! record, never in the session, so admin routes re-read it on every request
//! and a demotion takes effect immediately.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
