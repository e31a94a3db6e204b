//! Password verification (Argon2id, PHC string format).
//!
//! Accounts are provisioned with their hash by the surrounding platform; this
//! service only ever verifies.

use argon2::{Argon2, PasswordHash, PasswordVerifier};

/// Verify a password against a stored PHC hash string.
///
/// An unparseable stored hash counts as a mismatch rather than an error, so a
/// corrupted row cannot be told apart from a wrong password by the caller.
#[must_use]
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::{password_hash::SaltString, PasswordHasher};
    use rand::rngs::OsRng;

    fn hash(password: &str) -> String {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .unwrap()
            .to_string()
    }

    #[test]
    fn verify_round_trip() {
        let stored = hash("hunter2!");
        assert!(stored.starts_with("$argon2id$"));
        assert!(verify_password("hunter2!", &stored));
        assert!(!verify_password("hunter3!", &stored));
    }

    #[test]
    fn hashes_are_salted() {
        assert_ne!(hash("same-password"), hash("same-password"));
    }

    #[test]
    fn corrupted_hash_is_a_mismatch() {
        assert!(!verify_password("hunter2!", "not-a-phc-string"));
        assert!(!verify_password("hunter2!", ""));
    }
}
