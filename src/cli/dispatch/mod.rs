//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the appropriate
//! action, such as starting the API server with its full configuration state.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::auth;
use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;

/// Minimum length of the token signing secret in bytes.
const MIN_TOKEN_SECRET_BYTES: usize = 32;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;

    if auth_opts.token_secret.len() < MIN_TOKEN_SECRET_BYTES {
        return Err(anyhow!(
            "token secret must be at least {MIN_TOKEN_SECRET_BYTES} bytes"
        ));
    }

    Ok(Action::Server(Args {
        port,
        dsn,
        token_secret: SecretString::from(auth_opts.token_secret),
        totp_issuer: auth_opts.totp_issuer,
        frontend_base_url: auth_opts.frontend_base_url,
        temp_token_ttl_seconds: auth_opts.temp_token_ttl_seconds,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        login_otp_ttl_seconds: auth_opts.login_otp_ttl_seconds,
        request_otp_ttl_seconds: auth_opts.request_otp_ttl_seconds,
        otp_max_attempts: auth_opts.otp_max_attempts,
        otp_lockout_seconds: auth_opts.otp_lockout_seconds,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_secret_required() {
        temp_env::with_vars(
            [
                ("ENTRATA_TOKEN_SECRET", None::<&str>),
                ("ENTRATA_DSN", Some("postgres://user@localhost:5432/entrata")),
            ],
            || {
                let command = crate::cli::commands::new();
                let result = command.try_get_matches_from(vec!["entrata"]);
                assert!(result.is_err());
            },
        );
    }

    #[test]
    fn token_secret_too_short() {
        temp_env::with_vars(
            [
                ("ENTRATA_TOKEN_SECRET", Some("short")),
                ("ENTRATA_DSN", Some("postgres://user@localhost:5432/entrata")),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["entrata"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(err.to_string().contains("token secret"));
                }
            },
        );
    }

    #[test]
    fn server_action_from_env() {
        temp_env::with_vars(
            [
                (
                    "ENTRATA_TOKEN_SECRET",
                    Some("0123456789abcdef0123456789abcdef"),
                ),
                ("ENTRATA_DSN", Some("postgres://user@localhost:5432/entrata")),
                ("ENTRATA_PORT", Some("9090")),
                ("ENTRATA_SESSION_TTL_SECONDS", Some("3600")),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["entrata"]);
                let action = handler(&matches).unwrap();
                let Action::Server(args) = action;
                assert_eq!(args.port, 9090);
                assert_eq!(args.session_ttl_seconds, 3600);
                assert_eq!(args.temp_token_ttl_seconds, 600);
                assert_eq!(args.otp_max_attempts, 5);
            },
        );
    }
}
