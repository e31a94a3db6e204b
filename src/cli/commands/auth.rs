use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};

pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    let command = with_otp_args(command);
    with_totp_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("token-secret")
                .long("token-secret")
                .help("Secret key used to sign temporary and session tokens")
                .env("ENTRATA_TOKEN_SECRET")
                .required(true),
        )
        .arg(
            Arg::new("temp-token-ttl-seconds")
                .long("temp-token-ttl-seconds")
                .help("Temporary (MFA pending) token TTL in seconds")
                .env("ENTRATA_TEMP_TOKEN_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("session-ttl-seconds")
                .long("session-ttl-seconds")
                .help("Session token TTL in seconds")
                .env("ENTRATA_SESSION_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("frontend-base-url")
                .long("frontend-base-url")
                .help("Frontend base URL allowed as CORS origin")
                .env("ENTRATA_FRONTEND_BASE_URL")
                .default_value("http://localhost:3000"),
        )
}

fn with_otp_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("login-otp-ttl-seconds")
                .long("login-otp-ttl-seconds")
                .help("TTL for one-time codes issued during login")
                .env("ENTRATA_LOGIN_OTP_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("request-otp-ttl-seconds")
                .long("request-otp-ttl-seconds")
                .help("TTL for one-time codes issued on explicit request")
                .env("ENTRATA_REQUEST_OTP_TTL_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("otp-max-attempts")
                .long("otp-max-attempts")
                .help("Failed attempts before a one-time code is locked")
                .env("ENTRATA_OTP_MAX_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(i32)),
        )
        .arg(
            Arg::new("otp-lockout-seconds")
                .long("otp-lockout-seconds")
                .help("Lockout duration after too many failed attempts")
                .env("ENTRATA_OTP_LOCKOUT_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64)),
        )
}

fn with_totp_args(command: Command) -> Command {
    command.arg(
        Arg::new("totp-issuer")
            .long("totp-issuer")
            .help("Issuer name shown in authenticator apps")
            .env("ENTRATA_TOTP_ISSUER")
            .default_value("Entrata"),
    )
}

#[derive(Debug)]
pub struct Options {
    pub token_secret: String,
    pub temp_token_ttl_seconds: i64,
    pub session_ttl_seconds: i64,
    pub frontend_base_url: String,
    pub login_otp_ttl_seconds: i64,
    pub request_otp_ttl_seconds: i64,
    pub otp_max_attempts: i32,
    pub otp_lockout_seconds: i64,
    pub totp_issuer: String,
}

impl Options {
    /// Extract auth options from parsed matches.
    ///
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let token_secret = matches
            .get_one::<String>("token-secret")
            .cloned()
            .context("missing required argument: --token-secret")?;

        let temp_token_ttl_seconds = matches
            .get_one::<i64>("temp-token-ttl-seconds")
            .copied()
            .unwrap_or(600);

        let session_ttl_seconds = matches
            .get_one::<i64>("session-ttl-seconds")
            .copied()
            .unwrap_or(86_400);

        let frontend_base_url = matches
            .get_one::<String>("frontend-base-url")
            .cloned()
            .unwrap_or_else(|| "http://localhost:3000".to_string());

        let login_otp_ttl_seconds = matches
            .get_one::<i64>("login-otp-ttl-seconds")
            .copied()
            .unwrap_or(600);

        let request_otp_ttl_seconds = matches
            .get_one::<i64>("request-otp-ttl-seconds")
            .copied()
            .unwrap_or(300);

        let otp_max_attempts = matches
            .get_one::<i32>("otp-max-attempts")
            .copied()
            .unwrap_or(5);

        let otp_lockout_seconds = matches
            .get_one::<i64>("otp-lockout-seconds")
            .copied()
            .unwrap_or(900);

        let totp_issuer = matches
            .get_one::<String>("totp-issuer")
            .cloned()
            .unwrap_or_else(|| "Entrata".to_string());

        Ok(Self {
            token_secret,
            temp_token_ttl_seconds,
            session_ttl_seconds,
            frontend_base_url,
            login_otp_ttl_seconds,
            request_otp_ttl_seconds,
            otp_max_attempts,
            otp_lockout_seconds,
            totp_issuer,
        })
    }
}
