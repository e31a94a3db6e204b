//! Login and multi-factor authentication handlers.
//!
//! Flow overview:
//! 1) `POST /login` verifies the password for a tenant-scoped account.
//! 2) Accounts without MFA receive a session token directly. Accounts with
//!    MFA receive a temporary token; EMAIL/SMS accounts also get a one-time
//!    code dispatched immediately.
//! 3) `POST /verify-mfa` exchanges temporary token + code for a session token.
//!    `POST /request-mfa-code` re-issues a code for EMAIL/SMS accounts.
//! 4) `POST /setup-totp` (session token) enrolls an authenticator app.
//!
//! Security boundaries:
//! - Temporary tokens carry `mfa_pending` and are rejected everywhere except
//!   the MFA endpoints; session tokens are rejected there.
//! - Account existence is only revealed through the login endpoint's 404; the
//!   token-authenticated endpoints answer uniform 401s.
//! - The account's configured method must be in the tenant's allowed list;
//!   otherwise it is treated as not configured and the client must choose.

#[cfg(test)]
mod integration_tests;
pub(crate) mod method;
pub(crate) mod otp;
pub(crate) mod password;
pub(crate) mod rate_limit;
pub(crate) mod state;
pub(crate) mod storage;
pub(crate) mod token;
pub(crate) mod totp;
pub(crate) mod types;
pub(crate) mod utils;

pub use rate_limit::NoopRateLimiter;
pub use state::{AuthConfig, AuthState};
pub use token::TokenSigner;

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use self::{
    method::MfaMethod,
    rate_limit::{RateLimitAction, RateLimitDecision},
    storage::AccountRecord,
    types::{
        LoginRequest, LoginSuccessResponse, MessageResponse, MfaChallengeResponse, TotpSetupResponse,
        VerifiedSessionResponse, VerifyMfaRequest,
    },
    utils::{extract_bearer_token, extract_client_ip, normalize_email, valid_email},
};
use crate::api::dispatch::Message;

fn message_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(MessageResponse {
            message: message.to_string(),
        }),
    )
        .into_response()
}

/// Pick the effective MFA method for an account under tenant policy.
///
/// A configured method outside the tenant's allowed list counts as not
/// configured, forcing method selection instead of honoring a stale setting.
fn resolve_allowed_method(configured: Option<&str>, allowed: &[String]) -> Option<MfaMethod> {
    let method = configured.and_then(MfaMethod::parse)?;
    if allowed.iter().any(|name| name == method.as_str()) {
        Some(method)
    } else {
        None
    }
}

/// Resolve the account's effective MFA method under the tenant's policy.
///
/// Every endpoint that dispatches on the configured method goes through this,
/// so revoking a method from the tenant policy takes effect immediately, not
/// only at the next password login. A missing tenant resolves to no method.
async fn effective_mfa_method(
    pool: &PgPool,
    account: &AccountRecord,
) -> anyhow::Result<Option<MfaMethod>> {
    let allowed = storage::lookup_tenant_mfa_methods(pool, account.tenant_id)
        .await?
        .unwrap_or_default();
    let resolved = resolve_allowed_method(account.mfa_method.as_deref(), &allowed);
    if resolved.is_none() {
        if let Some(configured) = account.mfa_method.as_deref() {
            warn!(
                account_id = %account.id,
                configured,
                "configured MFA method not allowed by tenant"
            );
        }
    }
    Ok(resolved)
}

fn code_message(code: &str) -> Message {
    Message {
        to: String::new(),
        subject: "Your verification code".to_string(),
        body: format!("Your verification code is {code}. It expires shortly."),
    }
}

/// Dispatch a one-time code over the account's channel.
///
/// An SMS account without a phone number on file is a provisioning defect and
/// surfaces as an error rather than silently rerouting the code.
fn dispatch_code(
    auth_state: &AuthState,
    account: &AccountRecord,
    mfa_method: MfaMethod,
    code: &str,
) -> anyhow::Result<()> {
    let mut message = code_message(code);
    message.to = match mfa_method {
        MfaMethod::Sms => match account.phone.clone() {
            Some(phone) => phone,
            None => anyhow::bail!(
                "account {} has no phone number on file for SMS delivery",
                account.id
            ),
        },
        _ => account.email.clone(),
    };
    auth_state.sender().send(&message)
}

/// Authenticate with email + password within a tenant.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated, or MFA challenge issued", body = LoginSuccessResponse),
        (status = 400, description = "Missing or invalid payload", body = MessageResponse),
        (status = 401, description = "Invalid credentials", body = MessageResponse),
        (status = 404, description = "Unknown account or tenant", body = MessageResponse),
        (status = 429, description = "Rate limited", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return message_response(StatusCode::BAD_REQUEST, "Missing payload");
    };

    let Some(company_id) = request
        .company_id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    else {
        return message_response(StatusCode::BAD_REQUEST, "Company ID is required");
    };

    // Tenant ids are UUIDs; anything else can't match an account.
    let Ok(tenant_id) = Uuid::parse_str(company_id) else {
        return message_response(StatusCode::NOT_FOUND, "User not found");
    };

    let email = normalize_email(request.email.as_deref().unwrap_or_default());
    let password = request.password.as_deref().unwrap_or_default();
    if !valid_email(&email) || password.is_empty() {
        return message_response(StatusCode::NOT_FOUND, "User not found");
    }

    let client_ip = extract_client_ip(&headers);
    let limiter = auth_state.rate_limiter();
    if limiter.check_ip(client_ip.as_deref(), RateLimitAction::Login) == RateLimitDecision::Limited
        || limiter.check_email(&email, RateLimitAction::Login) == RateLimitDecision::Limited
    {
        warn!(%email, "login rate limited");
        return message_response(StatusCode::TOO_MANY_REQUESTS, "Rate limited");
    }

    let account = match storage::lookup_account(&pool, &email, tenant_id).await {
        Ok(Some(account)) => account,
        Ok(None) => {
            return message_response(StatusCode::NOT_FOUND, "User not found");
        }
        Err(err) => {
            error!("Failed to lookup account: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if !password::verify_password(password, &account.password_hash) {
        warn!(account_id = %account.id, "password mismatch");
        return message_response(StatusCode::UNAUTHORIZED, "Invalid credentials");
    }

    let config = auth_state.config();

    if !account.mfa_enabled {
        return match auth_state.signer().issue_session(
            account.id,
            &account.email,
            account.tenant_id,
            config.session_ttl_seconds(),
        ) {
            Ok(session_token) => {
                info!(account_id = %account.id, "login without MFA");
                (
                    StatusCode::OK,
                    Json(LoginSuccessResponse {
                        mfa_required: false,
                        id: account.id.to_string(),
                        name: account.name,
                        email: account.email,
                        token: session_token,
                    }),
                )
                    .into_response()
            }
            Err(err) => {
                error!("Failed to issue session token: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        };
    }

    let allowed = match storage::lookup_tenant_mfa_methods(&pool, tenant_id).await {
        Ok(Some(allowed)) => allowed,
        Ok(None) => {
            return message_response(StatusCode::NOT_FOUND, "Tenant not found");
        }
        Err(err) => {
            error!("Failed to lookup tenant MFA policy: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let resolved = resolve_allowed_method(account.mfa_method.as_deref(), &allowed);
    if resolved.is_none() {
        if let Some(configured) = account.mfa_method.as_deref() {
            warn!(
                account_id = %account.id,
                configured,
                "configured MFA method not allowed by tenant, forcing selection"
            );
        }
    }

    let temp_token = match auth_state.signer().issue_temporary(
        account.id,
        &account.email,
        account.tenant_id,
        config.temp_token_ttl_seconds(),
    ) {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to issue temporary token: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match resolved {
        None => (
            StatusCode::OK,
            Json(MfaChallengeResponse {
                mfa_required: true,
                temp_token,
                mfa_type: None,
                allowed_mfa_types: Some(allowed),
                message: Some("Select an MFA method to continue".to_string()),
            }),
        )
            .into_response(),
        Some(MfaMethod::Totp) => (
            StatusCode::OK,
            Json(MfaChallengeResponse {
                mfa_required: true,
                temp_token,
                mfa_type: Some(MfaMethod::Totp),
                allowed_mfa_types: None,
                message: Some("Enter the code from your authenticator app".to_string()),
            }),
        )
            .into_response(),
        Some(mfa_method) => {
            let code = otp::generate_code();
            match storage::store_otp(
                &pool,
                account.id,
                account.tenant_id,
                &code,
                config.login_otp_ttl_seconds(),
            )
            .await
            {
                Ok(true) => {}
                Ok(false) => {
                    return message_response(StatusCode::NOT_FOUND, "User not found");
                }
                Err(err) => {
                    error!("Failed to store OTP: {err}");
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            }

            if let Err(err) = dispatch_code(&auth_state, &account, mfa_method, &code) {
                error!("Failed to dispatch MFA code: {err}");
                return message_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to send MFA code",
                );
            }

            info!(account_id = %account.id, method = %mfa_method, "MFA code dispatched");

            (
                StatusCode::OK,
                Json(MfaChallengeResponse {
                    mfa_required: true,
                    temp_token,
                    mfa_type: Some(mfa_method),
                    allowed_mfa_types: None,
                    message: Some("MFA code sent".to_string()),
                }),
            )
                .into_response()
        }
    }
}

/// Identity carried by a verified temporary token.
struct PendingIdentity {
    account_id: Uuid,
    tenant_id: Uuid,
    email: String,
}

fn verify_temporary_identity(auth_state: &AuthState, headers: &HeaderMap) -> Option<PendingIdentity> {
    let token = extract_bearer_token(headers)?;
    let claims = auth_state.signer().verify_temporary(token).ok()?;
    let account_id = Uuid::parse_str(&claims.sub).ok()?;
    let tenant_id = Uuid::parse_str(&claims.tid).ok()?;
    Some(PendingIdentity {
        account_id,
        tenant_id,
        email: claims.email,
    })
}

/// Re-issue a one-time code for an EMAIL/SMS account.
#[utoipa::path(
    post,
    path = "/request-mfa-code",
    responses(
        (status = 200, description = "MFA code sent", body = MessageResponse),
        (status = 400, description = "MFA method does not require a code", body = MessageResponse),
        (status = 401, description = "Invalid or expired temporary token", body = MessageResponse),
        (status = 429, description = "Rate limited", body = MessageResponse)
    ),
    tag = "auth",
    security(("bearer" = []))
)]
pub async fn request_mfa_code(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Response {
    let Some(identity) = verify_temporary_identity(&auth_state, &headers) else {
        return message_response(
            StatusCode::UNAUTHORIZED,
            "Invalid or expired temporary token",
        );
    };

    let client_ip = extract_client_ip(&headers);
    let limiter = auth_state.rate_limiter();
    if limiter.check_ip(client_ip.as_deref(), RateLimitAction::RequestMfaCode)
        == RateLimitDecision::Limited
        || limiter.check_email(&identity.email, RateLimitAction::RequestMfaCode)
            == RateLimitDecision::Limited
    {
        warn!(email = %identity.email, "request-mfa-code rate limited");
        return message_response(StatusCode::TOO_MANY_REQUESTS, "Rate limited");
    }

    let account =
        match storage::lookup_account_by_id(&pool, identity.account_id, identity.tenant_id).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                return message_response(
                    StatusCode::UNAUTHORIZED,
                    "Invalid or expired temporary token",
                );
            }
            Err(err) => {
                error!("Failed to lookup account: {err}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

    let mfa_method = match effective_mfa_method(&pool, &account).await {
        Ok(Some(mfa_method)) if mfa_method.requires_dispatch() => mfa_method,
        Ok(_) => {
            return message_response(
                StatusCode::BAD_REQUEST,
                "MFA method does not require a code",
            );
        }
        Err(err) => {
            error!("Failed to resolve MFA method: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let code = otp::generate_code();
    match storage::store_otp(
        &pool,
        account.id,
        account.tenant_id,
        &code,
        auth_state.config().request_otp_ttl_seconds(),
    )
    .await
    {
        Ok(true) => {}
        Ok(false) => {
            return message_response(
                StatusCode::UNAUTHORIZED,
                "Invalid or expired temporary token",
            );
        }
        Err(err) => {
            error!("Failed to store OTP: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    if let Err(err) = dispatch_code(&auth_state, &account, mfa_method, &code) {
        error!("Failed to dispatch MFA code: {err}");
        return message_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to send MFA code");
    }

    info!(account_id = %account.id, method = %mfa_method, "MFA code re-issued");

    message_response(StatusCode::OK, "MFA code sent")
}

/// Verify a second factor and mint the session token.
#[utoipa::path(
    post,
    path = "/verify-mfa",
    request_body = VerifyMfaRequest,
    responses(
        (status = 200, description = "Authenticated", body = VerifiedSessionResponse),
        (status = 400, description = "Missing payload or unsupported method", body = MessageResponse),
        (status = 401, description = "Invalid token or code", body = MessageResponse),
        (status = 423, description = "Too many failed attempts", body = MessageResponse),
        (status = 429, description = "Rate limited", body = MessageResponse)
    ),
    tag = "auth",
    security(("bearer" = []))
)]
pub async fn verify_mfa(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<VerifyMfaRequest>>,
) -> Response {
    let Some(identity) = verify_temporary_identity(&auth_state, &headers) else {
        return message_response(
            StatusCode::UNAUTHORIZED,
            "Invalid or expired temporary token",
        );
    };

    let Some(code) = payload
        .and_then(|Json(request)| request.code)
        .map(|code| code.trim().to_string())
        .filter(|code| !code.is_empty())
    else {
        return message_response(StatusCode::BAD_REQUEST, "Code is required");
    };

    let client_ip = extract_client_ip(&headers);
    let limiter = auth_state.rate_limiter();
    if limiter.check_ip(client_ip.as_deref(), RateLimitAction::VerifyMfa)
        == RateLimitDecision::Limited
        || limiter.check_email(&identity.email, RateLimitAction::VerifyMfa)
            == RateLimitDecision::Limited
    {
        warn!(email = %identity.email, "verify-mfa rate limited");
        return message_response(StatusCode::TOO_MANY_REQUESTS, "Rate limited");
    }

    let account =
        match storage::lookup_account_by_id(&pool, identity.account_id, identity.tenant_id).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                return message_response(
                    StatusCode::UNAUTHORIZED,
                    "Invalid or expired temporary token",
                );
            }
            Err(err) => {
                error!("Failed to lookup account: {err}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

    let mfa_method = match effective_mfa_method(&pool, &account).await {
        Ok(Some(mfa_method)) => mfa_method,
        Ok(None) => {
            return message_response(StatusCode::BAD_REQUEST, "Unsupported MFA method");
        }
        Err(err) => {
            error!("Failed to resolve MFA method: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match mfa_method {
        MfaMethod::Totp => {
            let verified = account
                .totp_secret
                .as_deref()
                .is_some_and(|secret| auth_state.totp().verify(secret, &code));
            if !verified {
                warn!(account_id = %account.id, "TOTP verification failed");
                return message_response(StatusCode::UNAUTHORIZED, "Invalid MFA code");
            }
        }
        MfaMethod::Email | MfaMethod::Sms => {
            let config = auth_state.config();
            let outcome = match otp::verify(
                &pool,
                account.id,
                account.tenant_id,
                &code,
                config.otp_max_attempts(),
                config.otp_lockout_seconds(),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!("Failed to verify OTP: {err}");
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            };

            match outcome {
                otp::OtpVerifyOutcome::Verified => {}
                otp::OtpVerifyOutcome::NotFound => {
                    return message_response(
                        StatusCode::UNAUTHORIZED,
                        "OTP not generated or expired",
                    );
                }
                otp::OtpVerifyOutcome::Expired => {
                    return message_response(StatusCode::UNAUTHORIZED, "OTP expired");
                }
                otp::OtpVerifyOutcome::Mismatch { attempts, locked } => {
                    warn!(account_id = %account.id, attempts, locked, "OTP mismatch");
                    if locked {
                        return message_response(
                            StatusCode::LOCKED,
                            "Too many attempts, try again later",
                        );
                    }
                    return message_response(StatusCode::UNAUTHORIZED, "Invalid OTP code");
                }
                otp::OtpVerifyOutcome::Locked => {
                    return message_response(
                        StatusCode::LOCKED,
                        "Too many attempts, try again later",
                    );
                }
            }
        }
    }

    match auth_state.signer().issue_session(
        account.id,
        &account.email,
        account.tenant_id,
        auth_state.config().session_ttl_seconds(),
    ) {
        Ok(session_token) => {
            info!(account_id = %account.id, method = %mfa_method, "MFA verified");
            (
                StatusCode::OK,
                Json(VerifiedSessionResponse {
                    id: account.id.to_string(),
                    name: account.name,
                    email: account.email,
                    token: session_token,
                }),
            )
                .into_response()
        }
        Err(err) => {
            error!("Failed to issue session token: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Enroll an authenticator app for the authenticated account.
#[utoipa::path(
    post,
    path = "/setup-totp",
    responses(
        (status = 200, description = "TOTP secret generated", body = TotpSetupResponse),
        (status = 401, description = "Invalid or expired session token", body = MessageResponse)
    ),
    tag = "auth",
    security(("bearer" = []))
)]
pub async fn setup_totp(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Response {
    let claims = match extract_bearer_token(&headers)
        .ok_or(())
        .and_then(|token| auth_state.signer().verify_session(token).map_err(|_| ()))
    {
        Ok(claims) => claims,
        Err(()) => {
            return message_response(
                StatusCode::UNAUTHORIZED,
                "Invalid or expired session token",
            );
        }
    };

    let (Ok(account_id), Ok(tenant_id)) =
        (Uuid::parse_str(&claims.sub), Uuid::parse_str(&claims.tid))
    else {
        return message_response(
            StatusCode::UNAUTHORIZED,
            "Invalid or expired session token",
        );
    };

    let account = match storage::lookup_account_by_id(&pool, account_id, tenant_id).await {
        Ok(Some(account)) => account,
        Ok(None) => {
            return message_response(
                StatusCode::UNAUTHORIZED,
                "Invalid or expired session token",
            );
        }
        Err(err) => {
            error!("Failed to lookup account: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let setup = match auth_state.totp().setup(&account.email) {
        Ok(setup) => setup,
        Err(err) => {
            error!("Failed to generate TOTP secret: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match storage::save_totp_secret(&pool, account.id, account.tenant_id, &setup.secret_base32)
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            return message_response(
                StatusCode::UNAUTHORIZED,
                "Invalid or expired session token",
            );
        }
        Err(err) => {
            error!("Failed to save TOTP secret: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    info!(account_id = %account.id, "TOTP enrolled");

    (
        StatusCode::OK,
        Json(TotpSetupResponse {
            totp_secret: setup.secret_base32,
            otpauth_url: setup.otpauth_url,
            qr_code_data_url: setup.qr_data_url,
        }),
    )
        .into_response()
}
