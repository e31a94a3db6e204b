use crate::api::{self, handlers::auth};
use anyhow::Result;
use secrecy::SecretString;
use std::sync::Arc;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub token_secret: SecretString,
    pub totp_issuer: String,
    pub frontend_base_url: String,
    pub temp_token_ttl_seconds: i64,
    pub session_ttl_seconds: i64,
    pub login_otp_ttl_seconds: i64,
    pub request_otp_ttl_seconds: i64,
    pub otp_max_attempts: i32,
    pub otp_lockout_seconds: i64,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database connection or the listener cannot be set up.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = auth::AuthConfig::new(args.frontend_base_url)
        .with_totp_issuer(args.totp_issuer)
        .with_temp_token_ttl_seconds(args.temp_token_ttl_seconds)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_login_otp_ttl_seconds(args.login_otp_ttl_seconds)
        .with_request_otp_ttl_seconds(args.request_otp_ttl_seconds)
        .with_otp_max_attempts(args.otp_max_attempts)
        .with_otp_lockout_seconds(args.otp_lockout_seconds);

    api::new(
        args.port,
        args.dsn,
        args.token_secret,
        auth_config,
        Arc::new(api::dispatch::LogMessageSender),
    )
    .await
}
