//! One-time code generation and verification.
//!
//! Codes are six decimal digits from the OS CSPRNG. Verification is a small
//! state machine over the persisted account row: locked and expired states are
//! checked first, then the submitted code is compared in constant time, and a
//! match is only accepted if the atomic consume in the database wins.

use crate::api::handlers::auth::{storage, utils::constant_time_eq};
use anyhow::Result;
use rand::{rngs::OsRng, Rng};
use sqlx::PgPool;
use uuid::Uuid;

/// Generate a six digit code, zero padded.
pub(super) fn generate_code() -> String {
    let value: u32 = OsRng.gen_range(0..=999_999);
    format!("{value:06}")
}

#[derive(Debug, PartialEq, Eq)]
pub(super) enum OtpVerifyOutcome {
    Verified,
    /// No code outstanding: never issued, already consumed, or replaced.
    NotFound,
    Expired,
    Mismatch {
        attempts: i32,
        locked: bool,
    },
    /// Refused without comparing; a previous mismatch tripped the lock.
    Locked,
}

/// Verify a submitted code against the account's persisted OTP state.
///
/// A correct code only verifies once: the database consume is conditional on
/// the stored code still being present and unexpired, so a concurrent
/// verification of the same code resolves to exactly one `Verified`.
///
/// # Errors
/// Returns an error only on database failure; every auth-relevant result is an
/// `OtpVerifyOutcome`.
pub(super) async fn verify(
    pool: &PgPool,
    account_id: Uuid,
    tenant_id: Uuid,
    submitted: &str,
    max_attempts: i32,
    lockout_seconds: i64,
) -> Result<OtpVerifyOutcome> {
    match storage::load_otp_state(pool, account_id, tenant_id).await? {
        storage::OtpState::Locked => Ok(OtpVerifyOutcome::Locked),
        storage::OtpState::Missing => Ok(OtpVerifyOutcome::NotFound),
        storage::OtpState::Expired => {
            storage::clear_otp(pool, account_id, tenant_id).await?;
            Ok(OtpVerifyOutcome::Expired)
        }
        storage::OtpState::Present { code } => {
            if !constant_time_eq(&code, submitted) {
                let attempts = storage::record_otp_mismatch(
                    pool,
                    account_id,
                    tenant_id,
                    max_attempts,
                    lockout_seconds,
                )
                .await?;
                return Ok(OtpVerifyOutcome::Mismatch {
                    attempts,
                    locked: attempts >= max_attempts,
                });
            }

            if storage::consume_otp(pool, account_id, tenant_id, submitted).await? {
                Ok(OtpVerifyOutcome::Verified)
            } else {
                // Lost the race: another request consumed or replaced the code
                // between the read and the conditional update.
                Ok(OtpVerifyOutcome::NotFound)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_code_is_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn generate_code_varies() {
        let codes: std::collections::HashSet<String> = (0..50).map(|_| generate_code()).collect();
        // 50 draws from a million values colliding down to one is not credible
        assert!(codes.len() > 1);
    }

    /// In-memory mirror of the persisted OTP row, applying the same transition
    /// rules as the SQL statements in `storage`.
    #[derive(Default)]
    struct ModelRow {
        code: Option<String>,
        expired: bool,
        attempts: i32,
        locked: bool,
    }

    impl ModelRow {
        fn issue(&mut self, code: &str) {
            self.code = Some(code.to_string());
            self.expired = false;
            self.attempts = 0;
        }

        fn verify(&mut self, submitted: &str, max_attempts: i32) -> OtpVerifyOutcome {
            if self.locked {
                return OtpVerifyOutcome::Locked;
            }
            let Some(code) = self.code.clone() else {
                return OtpVerifyOutcome::NotFound;
            };
            if self.expired {
                self.code = None;
                return OtpVerifyOutcome::Expired;
            }
            if code != submitted {
                self.attempts += 1;
                if self.attempts >= max_attempts {
                    self.locked = true;
                    self.code = None;
                }
                return OtpVerifyOutcome::Mismatch {
                    attempts: self.attempts,
                    locked: self.locked,
                };
            }
            self.code = None;
            self.attempts = 0;
            OtpVerifyOutcome::Verified
        }
    }

    #[test]
    fn model_code_cannot_be_replayed() {
        let mut row = ModelRow::default();
        row.issue("123456");

        assert_eq!(row.verify("123456", 5), OtpVerifyOutcome::Verified);
        assert_eq!(row.verify("123456", 5), OtpVerifyOutcome::NotFound);
    }

    #[test]
    fn model_locks_after_max_attempts() {
        let mut row = ModelRow::default();
        row.issue("123456");

        assert_eq!(
            row.verify("000000", 3),
            OtpVerifyOutcome::Mismatch {
                attempts: 1,
                locked: false
            }
        );
        assert_eq!(
            row.verify("000001", 3),
            OtpVerifyOutcome::Mismatch {
                attempts: 2,
                locked: false
            }
        );
        assert_eq!(
            row.verify("000002", 3),
            OtpVerifyOutcome::Mismatch {
                attempts: 3,
                locked: true
            }
        );
        // Even the correct code is refused once locked
        assert_eq!(row.verify("123456", 3), OtpVerifyOutcome::Locked);
    }

    #[test]
    fn model_expired_code_clears() {
        let mut row = ModelRow::default();
        row.issue("123456");
        row.expired = true;

        assert_eq!(row.verify("123456", 5), OtpVerifyOutcome::Expired);
        assert_eq!(row.verify("123456", 5), OtpVerifyOutcome::NotFound);
    }

    #[test]
    fn model_reissue_resets_attempts() {
        let mut row = ModelRow::default();
        row.issue("123456");
        let _ = row.verify("000000", 5);
        let _ = row.verify("000000", 5);
        row.issue("654321");

        assert_eq!(row.attempts, 0);
        assert_eq!(row.verify("654321", 5), OtpVerifyOutcome::Verified);
    }
}
