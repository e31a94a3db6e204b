//! # Entrata (Multi-tenant Login & MFA)
//!
//! `entrata` is the authentication authority for a multi-tenant SaaS backend.
//! It owns the login state machine: password verification, tenant-scoped MFA
//! policy resolution, one-time code (OTP) and authenticator-app (TOTP)
//! verification, and signed token issuance.
//!
//! ## Tenant Model
//!
//! Companies are the tenant boundary. Accounts are unique per
//! `(tenant, email)`; the same email may exist under different tenants as
//! distinct accounts. Every lookup and mutation is scoped by tenant id.
//!
//! ## Login Flow
//!
//! 1. `POST /login` verifies the password. Accounts without MFA get a session
//!    token directly.
//! 2. Accounts with MFA get a short-lived temporary token carrying an
//!    `mfa_pending` claim. EMAIL/SMS accounts also get a one-time code
//!    dispatched immediately.
//! 3. `POST /verify-mfa` exchanges a valid code plus the temporary token for
//!    the long-lived session token.
//!
//! Temporary and session tokens are never interchangeable: each consuming
//! endpoint checks the `mfa_pending` claim.
//!
//! ## One-Time Codes
//!
//! OTP state is persisted on the account row (code, expiry, attempt counter,
//! lock timestamp), so any instance can verify a code issued by another.
//! Issuance is an atomic single-row upsert; verification consumes the code
//! with a compare-and-clear update so a code can never be replayed.

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

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
