//! Map validated command-line matches to the action the binary runs.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{self, ARG_ASSETS_DIR, ARG_BOOTSTRAP_ADMIN, ARG_PORT, database, session};
use anyhow::Result;
use std::path::PathBuf;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    commands::validate(matches).map_err(|e| anyhow::anyhow!(e))?;

    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(7000);
    let database_opts = database::Options::parse(matches)?;
    let session_opts = session::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn: database_opts.dsn,
        db_user: database_opts.user,
        db_password: database_opts.password,
        db_max_connections: database_opts.max_connections,
        session_secret: session_opts.secret,
        session_ttl_seconds: session_opts.ttl_seconds,
        session_cookie_secure: session_opts.cookie_secure,
        session_purge_seconds: session_opts.purge_seconds,
        assets_dir: matches.get_one::<PathBuf>(ARG_ASSETS_DIR).cloned(),
        bootstrap_admin: matches
            .get_one::<String>(ARG_BOOTSTRAP_ADMIN)
            .map(|username| username.trim().to_string())
            .filter(|username| !username.is_empty()),
    }))
}
