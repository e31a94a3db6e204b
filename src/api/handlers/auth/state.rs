//! Shared configuration and state for the auth handlers.

use crate::api::dispatch::MessageSender;
use crate::api::handlers::auth::{rate_limit::RateLimiter, token::TokenSigner, totp::TotpManager};
use std::sync::Arc;

pub const DEFAULT_TEMP_TOKEN_TTL_SECONDS: i64 = 600;
pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 86_400;
pub const DEFAULT_LOGIN_OTP_TTL_SECONDS: i64 = 600;
pub const DEFAULT_REQUEST_OTP_TTL_SECONDS: i64 = 300;
pub const DEFAULT_OTP_MAX_ATTEMPTS: i32 = 5;
pub const DEFAULT_OTP_LOCKOUT_SECONDS: i64 = 900;
pub const DEFAULT_TOTP_ISSUER: &str = "Entrata";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    totp_issuer: String,
    temp_token_ttl_seconds: i64,
    session_ttl_seconds: i64,
    login_otp_ttl_seconds: i64,
    request_otp_ttl_seconds: i64,
    otp_max_attempts: i32,
    otp_lockout_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            totp_issuer: DEFAULT_TOTP_ISSUER.to_string(),
            temp_token_ttl_seconds: DEFAULT_TEMP_TOKEN_TTL_SECONDS,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            login_otp_ttl_seconds: DEFAULT_LOGIN_OTP_TTL_SECONDS,
            request_otp_ttl_seconds: DEFAULT_REQUEST_OTP_TTL_SECONDS,
            otp_max_attempts: DEFAULT_OTP_MAX_ATTEMPTS,
            otp_lockout_seconds: DEFAULT_OTP_LOCKOUT_SECONDS,
        }
    }

    #[must_use]
    pub fn with_totp_issuer(mut self, issuer: String) -> Self {
        self.totp_issuer = issuer;
        self
    }

    #[must_use]
    pub const fn with_temp_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.temp_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub const fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub const fn with_login_otp_ttl_seconds(mut self, seconds: i64) -> Self {
        self.login_otp_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub const fn with_request_otp_ttl_seconds(mut self, seconds: i64) -> Self {
        self.request_otp_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub const fn with_otp_max_attempts(mut self, attempts: i32) -> Self {
        self.otp_max_attempts = attempts;
        self
    }

    #[must_use]
    pub const fn with_otp_lockout_seconds(mut self, seconds: i64) -> Self {
        self.otp_lockout_seconds = seconds;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn totp_issuer(&self) -> &str {
        &self.totp_issuer
    }

    #[must_use]
    pub const fn temp_token_ttl_seconds(&self) -> i64 {
        self.temp_token_ttl_seconds
    }

    #[must_use]
    pub const fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub const fn login_otp_ttl_seconds(&self) -> i64 {
        self.login_otp_ttl_seconds
    }

    #[must_use]
    pub const fn request_otp_ttl_seconds(&self) -> i64 {
        self.request_otp_ttl_seconds
    }

    #[must_use]
    pub const fn otp_max_attempts(&self) -> i32 {
        self.otp_max_attempts
    }

    #[must_use]
    pub const fn otp_lockout_seconds(&self) -> i64 {
        self.otp_lockout_seconds
    }
}

/// Per-process auth state shared with every handler via `Extension`.
pub struct AuthState {
    config: AuthConfig,
    signer: TokenSigner,
    totp: TotpManager,
    rate_limiter: Arc<dyn RateLimiter>,
    sender: Arc<dyn MessageSender>,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        signer: TokenSigner,
        rate_limiter: Arc<dyn RateLimiter>,
        sender: Arc<dyn MessageSender>,
    ) -> Self {
        let totp = TotpManager::new(config.totp_issuer().to_string());
        Self {
            config,
            signer,
            totp,
            rate_limiter,
            sender,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub const fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    #[must_use]
    pub const fn totp(&self) -> &TotpManager {
        &self.totp
    }

    #[must_use]
    pub fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }

    #[must_use]
    pub fn sender(&self) -> &dyn MessageSender {
        self.sender.as_ref()
    }
}
