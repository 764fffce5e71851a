use crate::api::{self, ServerConfig, handlers::auth::AuthConfig};
use anyhow::{Result, anyhow};
use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;
use tracing::debug;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub db_user: Option<String>,
    pub db_password: Option<SecretString>,
    pub db_max_connections: u32,
    pub session_secret: SecretString,
    pub session_ttl_seconds: i64,
    pub session_cookie_secure: bool,
    pub session_purge_seconds: u64,
    pub assets_dir: Option<PathBuf>,
    pub bootstrap_admin: Option<String>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the DSN is invalid, the database is unreachable, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let dsn = build_dsn(
        &args.dsn,
        args.db_user.as_deref(),
        args.db_password.as_ref(),
    )?;

    let auth_config = AuthConfig::new(args.session_secret)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_session_cookie_secure(args.session_cookie_secure);

    let mut server_config = ServerConfig::new()
        .with_max_connections(args.db_max_connections)
        .with_session_purge_seconds(args.session_purge_seconds);
    if let Some(dir) = args.assets_dir {
        server_config = server_config.with_assets_dir(dir);
    }
    if let Some(username) = args.bootstrap_admin {
        server_config = server_config.with_bootstrap_admin(username);
    }

    debug!(?server_config, "starting server");

    api::new(args.port, dsn, auth_config, server_config).await
}

/// Parse the DSN and inject credentials supplied outside of it.
fn build_dsn(dsn: &str, user: Option<&str>, password: Option<&SecretString>) -> Result<String> {
    let mut dsn = Url::parse(dsn)?;

    if let Some(user) = user {
        dsn.set_username(user)
            .map_err(|()| anyhow!("Error setting username"))?;
    }

    if let Some(password) = password {
        dsn.set_password(Some(password.expose_secret()))
            .map_err(|()| anyhow!("Error setting password"))?;
    }

    Ok(dsn.to_string())
}
