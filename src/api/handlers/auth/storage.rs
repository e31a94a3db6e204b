//! Database helpers for accounts, tenant policy, and OTP state.
//!
//! OTP state lives on the `accounts` row (code, expiry, attempt counter, lock
//! timestamp) so any instance can verify a code issued by another. All
//! mutations are single-statement and tenant-scoped.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

/// Account fields the auth handlers work with.
#[derive(Debug, Clone)]
pub(super) struct AccountRecord {
    pub(super) id: Uuid,
    pub(super) tenant_id: Uuid,
    pub(super) email: String,
    pub(super) name: String,
    pub(super) phone: Option<String>,
    pub(super) password_hash: String,
    pub(super) mfa_enabled: bool,
    pub(super) mfa_method: Option<String>,
    pub(super) totp_secret: Option<String>,
}

fn account_from_row(row: &sqlx::postgres::PgRow) -> AccountRecord {
    AccountRecord {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        email: row.get("email"),
        name: row.get("name"),
        phone: row.get("phone"),
        password_hash: row.get("password_hash"),
        mfa_enabled: row.get("mfa_enabled"),
        mfa_method: row.get("mfa_method"),
        totp_secret: row.get("totp_secret"),
    }
}

/// Look up an account by normalized email within a tenant.
pub(super) async fn lookup_account(
    pool: &PgPool,
    email: &str,
    tenant_id: Uuid,
) -> Result<Option<AccountRecord>> {
    let query = r"
        SELECT id, tenant_id, email, name, phone, password_hash,
               mfa_enabled, mfa_method, totp_secret
        FROM accounts
        WHERE email = $1 AND tenant_id = $2
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(tenant_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup account by email")?;

    Ok(row.map(|row| account_from_row(&row)))
}

/// Look up an account by id within a tenant (token-derived identity).
pub(super) async fn lookup_account_by_id(
    pool: &PgPool,
    account_id: Uuid,
    tenant_id: Uuid,
) -> Result<Option<AccountRecord>> {
    let query = r"
        SELECT id, tenant_id, email, name, phone, password_hash,
               mfa_enabled, mfa_method, totp_secret
        FROM accounts
        WHERE id = $1 AND tenant_id = $2
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(account_id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup account by id")?;

    Ok(row.map(|row| account_from_row(&row)))
}

/// Fetch the tenant's allowed MFA method names, `None` if the tenant is gone.
pub(super) async fn lookup_tenant_mfa_methods(
    pool: &PgPool,
    tenant_id: Uuid,
) -> Result<Option<Vec<String>>> {
    let query = "SELECT allowed_mfa_methods FROM tenants WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(tenant_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup tenant MFA policy")?;

    Ok(row.map(|row| row.get("allowed_mfa_methods")))
}

/// Store a fresh OTP on the account row, replacing any previous one and
/// resetting the attempt counter. Returns `false` if the account vanished.
pub(super) async fn store_otp(
    pool: &PgPool,
    account_id: Uuid,
    tenant_id: Uuid,
    code: &str,
    ttl_seconds: i64,
) -> Result<bool> {
    let query = r"
        UPDATE accounts
        SET otp_code = $3,
            otp_expires_at = NOW() + ($4 * INTERVAL '1 second'),
            otp_attempts = 0
        WHERE id = $1 AND tenant_id = $2
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(account_id)
        .bind(tenant_id)
        .bind(code)
        .bind(ttl_seconds)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to store OTP")?;

    Ok(result.rows_affected() == 1)
}

/// Snapshot of the persisted OTP state for one account.
#[derive(Debug)]
pub(super) enum OtpState {
    /// No code has been issued, or the last one was already consumed.
    Missing,
    /// Too many failed attempts; verification is refused until the lock expires.
    Locked,
    Expired,
    Present { code: String },
}

pub(super) async fn load_otp_state(
    pool: &PgPool,
    account_id: Uuid,
    tenant_id: Uuid,
) -> Result<OtpState> {
    let query = r"
        SELECT otp_code,
               (otp_lock_until IS NOT NULL AND otp_lock_until > NOW()) AS locked,
               (otp_expires_at IS NULL OR otp_expires_at <= NOW()) AS expired
        FROM accounts
        WHERE id = $1 AND tenant_id = $2
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(account_id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to load OTP state")?;

    let Some(row) = row else {
        return Ok(OtpState::Missing);
    };

    let locked: bool = row.get("locked");
    if locked {
        return Ok(OtpState::Locked);
    }

    let Some(code) = row.get::<Option<String>, _>("otp_code") else {
        return Ok(OtpState::Missing);
    };

    let expired: bool = row.get("expired");
    if expired {
        return Ok(OtpState::Expired);
    }

    Ok(OtpState::Present { code })
}

/// Drop any stored OTP without touching the attempt counter or lock.
pub(super) async fn clear_otp(pool: &PgPool, account_id: Uuid, tenant_id: Uuid) -> Result<()> {
    let query = r"
        UPDATE accounts
        SET otp_code = NULL, otp_expires_at = NULL
        WHERE id = $1 AND tenant_id = $2
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(account_id)
        .bind(tenant_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to clear OTP")?;

    Ok(())
}

/// Atomically consume a matching, unexpired OTP.
///
/// The compare happens inside the UPDATE, so two concurrent verifications of
/// the same code can never both succeed. Returns `false` when the code was
/// already consumed, replaced, or expired.
pub(super) async fn consume_otp(
    pool: &PgPool,
    account_id: Uuid,
    tenant_id: Uuid,
    code: &str,
) -> Result<bool> {
    let query = r"
        UPDATE accounts
        SET otp_code = NULL, otp_expires_at = NULL, otp_attempts = 0
        WHERE id = $1 AND tenant_id = $2
          AND otp_code = $3
          AND otp_expires_at > NOW()
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(account_id)
        .bind(tenant_id)
        .bind(code)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to consume OTP")?;

    Ok(row.is_some())
}

/// Record a failed attempt; on hitting `max_attempts` the account is locked
/// for `lockout_seconds` and the stored code is dropped. Returns the updated
/// attempt count.
pub(super) async fn record_otp_mismatch(
    pool: &PgPool,
    account_id: Uuid,
    tenant_id: Uuid,
    max_attempts: i32,
    lockout_seconds: i64,
) -> Result<i32> {
    let query = r"
        UPDATE accounts
        SET otp_attempts = otp_attempts + 1,
            otp_lock_until = CASE
                WHEN otp_attempts + 1 >= $3 THEN NOW() + ($4 * INTERVAL '1 second')
                ELSE otp_lock_until
            END,
            otp_code = CASE WHEN otp_attempts + 1 >= $3 THEN NULL ELSE otp_code END,
            otp_expires_at = CASE WHEN otp_attempts + 1 >= $3 THEN NULL ELSE otp_expires_at END
        WHERE id = $1 AND tenant_id = $2
        RETURNING otp_attempts
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(account_id)
        .bind(tenant_id)
        .bind(max_attempts)
        .bind(lockout_seconds)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to record OTP mismatch")?;

    Ok(row.get("otp_attempts"))
}

/// Persist a newly enrolled TOTP secret. Returns `false` if the account vanished.
pub(super) async fn save_totp_secret(
    pool: &PgPool,
    account_id: Uuid,
    tenant_id: Uuid,
    secret_base32: &str,
) -> Result<bool> {
    let query = r"
        UPDATE accounts
        SET totp_secret = $3
        WHERE id = $1 AND tenant_id = $2
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(account_id)
        .bind(tenant_id)
        .bind(secret_base32)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to save TOTP secret")?;

    Ok(result.rows_affected() == 1)
}
