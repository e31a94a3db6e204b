//! Signed token codec for the login flow.
//!
//! Two token kinds share one HS256 JWT format:
//!
//! - **Temporary token**: issued after password verification when MFA is
//!   required. Carries `mfa_pending: true` and a short TTL. Only accepted by
//!   the MFA endpoints.
//! - **Session token**: issued after full authentication. No `mfa_pending`
//!   claim. Only accepted by authenticated endpoints.
//!
//! Verification is strict about the kind: a temporary token can never be used
//! as a session token and vice versa.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenHeader {
    alg: String,
    typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthTokenClaims {
    /// Account id.
    pub sub: String,
    pub email: String,
    /// Tenant id the account belongs to.
    pub tid: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mfa_pending: Option<bool>,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signing key")]
    InvalidKey,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("wrong token kind")]
    WrongKind,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Current time as Unix seconds.
pub fn now_unix_seconds() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

/// Issues and verifies HS256 login tokens with a shared secret.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
}

impl TokenSigner {
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self {
            secret: secret.to_vec(),
        }
    }

    fn sign(&self, claims: &AuthTokenClaims) -> Result<String, Error> {
        let header_b64 = b64e_json(&TokenHeader::hs256())?;
        let claims_b64 = b64e_json(claims)?;
        let signing_input = format!("{header_b64}.{claims_b64}");

        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| Error::InvalidKey)?;
        mac.update(signing_input.as_bytes());
        let signature_b64 = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature_b64}"))
    }

    fn verify(&self, token: &str, now_unix_seconds: i64) -> Result<AuthTokenClaims, Error> {
        let mut parts = token.split('.');
        let header_b64 = parts.next().ok_or(Error::TokenFormat)?;
        let claims_b64 = parts.next().ok_or(Error::TokenFormat)?;
        let sig_b64 = parts.next().ok_or(Error::TokenFormat)?;
        if parts.next().is_some() {
            return Err(Error::TokenFormat);
        }

        let header: TokenHeader = b64d_json(header_b64)?;
        if header.alg != "HS256" {
            return Err(Error::UnsupportedAlg(header.alg));
        }

        let signing_input = format!("{header_b64}.{claims_b64}");
        let signature_bytes = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;

        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| Error::InvalidKey)?;
        mac.update(signing_input.as_bytes());
        // verify_slice is constant-time
        mac.verify_slice(&signature_bytes)
            .map_err(|_| Error::InvalidSignature)?;

        let claims: AuthTokenClaims = b64d_json(claims_b64)?;
        if claims.exp <= now_unix_seconds {
            return Err(Error::Expired);
        }

        Ok(claims)
    }

    /// Issue a short-lived temporary token carrying the `mfa_pending` claim.
    ///
    /// # Errors
    /// Returns an error if claims cannot be encoded or signing fails.
    pub fn issue_temporary(
        &self,
        account_id: Uuid,
        email: &str,
        tenant_id: Uuid,
        ttl_seconds: i64,
    ) -> Result<String, Error> {
        let now = now_unix_seconds();
        self.sign(&AuthTokenClaims {
            sub: account_id.to_string(),
            email: email.to_string(),
            tid: tenant_id.to_string(),
            iat: now,
            exp: now + ttl_seconds,
            mfa_pending: Some(true),
        })
    }

    /// Issue a session token for a fully authenticated account.
    ///
    /// # Errors
    /// Returns an error if claims cannot be encoded or signing fails.
    pub fn issue_session(
        &self,
        account_id: Uuid,
        email: &str,
        tenant_id: Uuid,
        ttl_seconds: i64,
    ) -> Result<String, Error> {
        let now = now_unix_seconds();
        self.sign(&AuthTokenClaims {
            sub: account_id.to_string(),
            email: email.to_string(),
            tid: tenant_id.to_string(),
            iat: now,
            exp: now + ttl_seconds,
            mfa_pending: None,
        })
    }

    /// Verify a temporary token.
    ///
    /// # Errors
    /// Returns an error if the token is malformed, tampered with, expired, or
    /// is not a temporary token.
    pub fn verify_temporary(&self, token: &str) -> Result<AuthTokenClaims, Error> {
        let claims = self.verify(token, now_unix_seconds())?;
        if claims.mfa_pending != Some(true) {
            return Err(Error::WrongKind);
        }
        Ok(claims)
    }

    /// Verify a session token.
    ///
    /// # Errors
    /// Returns an error if the token is malformed, tampered with, expired, or
    /// is a temporary (MFA pending) token.
    pub fn verify_session(&self, token: &str) -> Result<AuthTokenClaims, Error> {
        let claims = self.verify(token, now_unix_seconds())?;
        if claims.mfa_pending.is_some() {
            return Err(Error::WrongKind);
        }
        Ok(claims)
    }
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn signer() -> TokenSigner {
        TokenSigner::new(SECRET)
    }

    fn ids() -> (Uuid, Uuid) {
        (Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn temporary_round_trip() -> Result<(), Error> {
        let (account_id, tenant_id) = ids();
        let token = signer().issue_temporary(account_id, "a@example.com", tenant_id, 600)?;

        let claims = signer().verify_temporary(&token)?;
        assert_eq!(claims.sub, account_id.to_string());
        assert_eq!(claims.email, "a@example.com");
        assert_eq!(claims.tid, tenant_id.to_string());
        assert_eq!(claims.mfa_pending, Some(true));
        Ok(())
    }

    #[test]
    fn session_round_trip() -> Result<(), Error> {
        let (account_id, tenant_id) = ids();
        let token = signer().issue_session(account_id, "a@example.com", tenant_id, 86_400)?;

        let claims = signer().verify_session(&token)?;
        assert_eq!(claims.sub, account_id.to_string());
        assert_eq!(claims.mfa_pending, None);
        Ok(())
    }

    #[test]
    fn kinds_are_not_interchangeable() -> Result<(), Error> {
        let (account_id, tenant_id) = ids();
        let temporary = signer().issue_temporary(account_id, "a@example.com", tenant_id, 600)?;
        let session = signer().issue_session(account_id, "a@example.com", tenant_id, 600)?;

        assert!(matches!(
            signer().verify_session(&temporary),
            Err(Error::WrongKind)
        ));
        assert!(matches!(
            signer().verify_temporary(&session),
            Err(Error::WrongKind)
        ));
        Ok(())
    }

    #[test]
    fn rejects_expired() -> Result<(), Error> {
        let (account_id, tenant_id) = ids();
        let token = signer().issue_temporary(account_id, "a@example.com", tenant_id, -10)?;
        assert!(matches!(
            signer().verify_temporary(&token),
            Err(Error::Expired)
        ));
        Ok(())
    }

    #[test]
    fn rejects_wrong_secret() -> Result<(), Error> {
        let (account_id, tenant_id) = ids();
        let token = signer().issue_session(account_id, "a@example.com", tenant_id, 600)?;

        let other = TokenSigner::new(b"ffffffffffffffffffffffffffffffff");
        assert!(matches!(
            other.verify_session(&token),
            Err(Error::InvalidSignature)
        ));
        Ok(())
    }

    #[test]
    fn rejects_tampered_claims() -> Result<(), Error> {
        let (account_id, tenant_id) = ids();
        let token = signer().issue_session(account_id, "a@example.com", tenant_id, 600)?;

        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = b64e_json(&AuthTokenClaims {
            sub: account_id.to_string(),
            email: "evil@example.com".to_string(),
            tid: tenant_id.to_string(),
            iat: now_unix_seconds(),
            exp: now_unix_seconds() + 600,
            mfa_pending: None,
        })?;
        parts[1] = &forged;
        let tampered = parts.join(".");

        assert!(matches!(
            signer().verify_session(&tampered),
            Err(Error::InvalidSignature)
        ));
        Ok(())
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(matches!(
            signer().verify_session("not-a-token"),
            Err(Error::TokenFormat)
        ));
        assert!(matches!(
            signer().verify_session("a.b.c.d"),
            Err(Error::TokenFormat)
        ));
        assert!(matches!(
            signer().verify_session("!!.!!.!!"),
            Err(Error::Base64)
        ));
    }
}
