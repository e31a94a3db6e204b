//! MFA method identifiers shared by accounts and tenant policy.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Supported second factors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum MfaMethod {
    #[serde(rename = "TOTP")]
    Totp,
    #[serde(rename = "EMAIL")]
    Email,
    #[serde(rename = "SMS")]
    Sms,
}

impl MfaMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Totp => "TOTP",
            Self::Email => "EMAIL",
            Self::Sms => "SMS",
        }
    }

    /// Parse a stored method name. Unknown values map to `None` so stale rows
    /// degrade to "not configured" instead of failing the login.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "TOTP" => Some(Self::Totp),
            "EMAIL" => Some(Self::Email),
            "SMS" => Some(Self::Sms),
            _ => None,
        }
    }

    /// Whether the method delivers a one-time code out of band.
    #[must_use]
    pub const fn requires_dispatch(self) -> bool {
        matches!(self, Self::Email | Self::Sms)
    }
}

impl std::fmt::Display for MfaMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_methods() {
        assert_eq!(MfaMethod::parse("TOTP"), Some(MfaMethod::Totp));
        assert_eq!(MfaMethod::parse("EMAIL"), Some(MfaMethod::Email));
        assert_eq!(MfaMethod::parse("SMS"), Some(MfaMethod::Sms));
    }

    #[test]
    fn parse_rejects_unknown_and_case() {
        assert_eq!(MfaMethod::parse("totp"), None);
        assert_eq!(MfaMethod::parse("PUSH"), None);
        assert_eq!(MfaMethod::parse(""), None);
    }

    #[test]
    fn serde_uses_wire_names() {
        assert_eq!(
            serde_json::to_string(&MfaMethod::Totp).unwrap(),
            "\"TOTP\""
        );
        let parsed: MfaMethod = serde_json::from_str("\"SMS\"").unwrap();
        assert_eq!(parsed, MfaMethod::Sms);
    }

    #[test]
    fn dispatch_methods() {
        assert!(!MfaMethod::Totp.requires_dispatch());
        assert!(MfaMethod::Email.requires_dispatch());
        assert!(MfaMethod::Sms.requires_dispatch());
    }
}
