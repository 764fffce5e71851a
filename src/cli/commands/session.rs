use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_SESSION_COOKIE_SECURE: &str = "session-cookie-secure";
pub const ARG_SESSION_PURGE_SECONDS: &str = "session-purge-seconds";

/// Shortest accepted session secret, in bytes.
pub const MIN_SESSION_SECRET_LEN: usize = 32;

/// Longest accepted session lifetime: one year.
pub const MAX_SESSION_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long(ARG_SESSION_SECRET)
                .help("Secret used to key session id hashes (at least 32 characters)")
                .env("CLUBHOUSE_SESSION_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Absolute session lifetime in seconds, counted from login")
                .env("CLUBHOUSE_SESSION_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_SESSION_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_SESSION_COOKIE_SECURE)
                .long(ARG_SESSION_COOKIE_SECURE)
                .help("Mark the session cookie Secure (serve over HTTPS)")
                .env("CLUBHOUSE_SESSION_COOKIE_SECURE")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_SESSION_PURGE_SECONDS)
                .long(ARG_SESSION_PURGE_SECONDS)
                .help("Interval between expired session purges")
                .env("CLUBHOUSE_SESSION_PURGE_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub secret: SecretString,
    pub ttl_seconds: i64,
    pub cookie_secure: bool,
    pub purge_seconds: u64,
}

impl Options {
    /// # Errors
    /// Returns an error if the secret is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            secret: matches
                .get_one::<String>(ARG_SESSION_SECRET)
                .map(|secret| SecretString::from(secret.clone()))
                .context("missing required argument: --session-secret")?,
            ttl_seconds: matches
                .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(3600),
            cookie_secure: matches.get_flag(ARG_SESSION_COOKIE_SECURE),
            purge_seconds: matches
                .get_one::<u64>(ARG_SESSION_PURGE_SECONDS)
                .copied()
                .unwrap_or(300),
        })
    }
}
