//! TOTP enrollment and verification (RFC 6238, SHA1, 6 digits, 30s step).

use anyhow::{anyhow, Result};
use totp_rs::{Algorithm, Secret, TOTP};

/// Material returned to the client when enrolling an authenticator app.
#[derive(Debug)]
pub struct TotpSetup {
    pub secret_base32: String,
    pub otpauth_url: String,
    pub qr_data_url: String,
}

#[derive(Clone, Debug)]
pub struct TotpManager {
    issuer: String,
}

impl TotpManager {
    #[must_use]
    pub fn new(issuer: String) -> Self {
        Self { issuer }
    }

    fn totp_from_bytes(&self, secret_bytes: Vec<u8>, label: &str) -> Result<TOTP> {
        TOTP::new(
            Algorithm::SHA1,
            6,
            1,
            30,
            secret_bytes,
            Some(self.issuer.clone()),
            label.to_string(),
        )
        .map_err(|e| anyhow!("TOTP init error: {e}"))
    }

    /// Generate a fresh secret plus the provisioning URL and QR code for it.
    ///
    /// # Errors
    /// Returns an error if secret generation or QR rendering fails.
    pub fn setup(&self, account_email: &str) -> Result<TotpSetup> {
        let secret = Secret::generate_secret();
        let secret_bytes = secret
            .to_bytes()
            .map_err(|e| anyhow!("Secret gen error: {e}"))?;

        let totp = self.totp_from_bytes(secret_bytes, account_email)?;

        let qr = totp
            .get_qr_base64()
            .map_err(|e| anyhow!("QR gen error: {e}"))?;

        Ok(TotpSetup {
            secret_base32: totp.get_secret_base32(),
            otpauth_url: totp.get_url(),
            qr_data_url: format!("data:image/png;base64,{qr}"),
        })
    }

    /// Check a submitted code against a stored base32 secret.
    ///
    /// Allows one time-step of clock skew in either direction. Returns `false`
    /// for undecodable secrets so a corrupted row reads as a failed code.
    #[must_use]
    pub fn verify(&self, secret_base32: &str, code: &str) -> bool {
        let Ok(secret_bytes) = Secret::Encoded(secret_base32.to_string()).to_bytes() else {
            return false;
        };
        let Ok(totp) = self.totp_from_bytes(secret_bytes, "account") else {
            return false;
        };
        totp.check_current(code).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_produces_consistent_material() {
        let manager = TotpManager::new("Entrata".to_string());
        let setup = manager.setup("a@example.com").unwrap();

        assert!(!setup.secret_base32.is_empty());
        assert!(setup.otpauth_url.starts_with("otpauth://totp/"));
        assert!(setup.otpauth_url.contains("issuer=Entrata"));
        assert!(setup.qr_data_url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn verify_accepts_current_code() {
        let manager = TotpManager::new("Entrata".to_string());
        let setup = manager.setup("a@example.com").unwrap();

        let secret_bytes = Secret::Encoded(setup.secret_base32.clone())
            .to_bytes()
            .unwrap();
        let totp = TOTP::new(
            Algorithm::SHA1,
            6,
            1,
            30,
            secret_bytes,
            Some("Entrata".to_string()),
            "a@example.com".to_string(),
        )
        .unwrap();
        let code = totp.generate_current().unwrap();

        assert!(manager.verify(&setup.secret_base32, &code));
    }

    #[test]
    fn verify_rejects_wrong_code_and_secret() {
        let manager = TotpManager::new("Entrata".to_string());
        let setup = manager.setup("a@example.com").unwrap();

        assert!(!manager.verify(&setup.secret_base32, "000000"));
        assert!(!manager.verify("not-base32!!", "123456"));
    }
}
