//! Request and response bodies for the auth endpoints.

use crate::api::handlers::auth::method::MfaMethod;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    /// Tenant id the login is scoped to.
    #[serde(rename = "companyID")]
    pub company_id: Option<String>,
}

/// Returned when authentication completes (no MFA, or MFA already verified).
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginSuccessResponse {
    pub mfa_required: bool,
    pub id: String,
    pub name: String,
    pub email: String,
    pub token: String,
}

/// Returned when the password checked out but a second factor is pending.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MfaChallengeResponse {
    pub mfa_required: bool,
    pub temp_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mfa_type: Option<MfaMethod>,
    /// Tenant-allowed methods, present only when the account has none configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_mfa_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyMfaRequest {
    pub code: Option<String>,
}

/// Returned by `/verify-mfa` once the second factor checks out.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedSessionResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TotpSetupResponse {
    pub totp_secret: String,
    pub otpauth_url: String,
    #[serde(rename = "qrCodeDataURL")]
    pub qr_code_data_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_request_accepts_company_id_alias() {
        let request: LoginRequest = serde_json::from_str(
            r#"{"email":"a@example.com","password":"pw","companyID":"t-1"}"#,
        )
        .unwrap();
        assert_eq!(request.company_id.as_deref(), Some("t-1"));
    }

    #[test]
    fn login_request_fields_are_optional() {
        let request: LoginRequest = serde_json::from_str("{}").unwrap();
        assert!(request.email.is_none());
        assert!(request.password.is_none());
        assert!(request.company_id.is_none());
    }

    #[test]
    fn success_response_uses_camel_case() {
        let response = LoginSuccessResponse {
            mfa_required: false,
            id: "id".to_string(),
            name: "Ada".to_string(),
            email: "a@example.com".to_string(),
            token: "token".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["mfaRequired"], false);
        assert_eq!(json["token"], "token");
    }

    #[test]
    fn challenge_response_skips_absent_fields() {
        let response = MfaChallengeResponse {
            mfa_required: true,
            temp_token: "temp".to_string(),
            mfa_type: Some(MfaMethod::Email),
            allowed_mfa_types: None,
            message: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["mfaRequired"], true);
        assert_eq!(json["tempToken"], "temp");
        assert_eq!(json["mfaType"], "EMAIL");
        assert!(json.get("allowedMfaTypes").is_none());
        assert!(json.get("message").is_none());
    }

    #[test]
    fn verified_session_response_carries_no_mfa_flag() {
        let response = VerifiedSessionResponse {
            id: "id".to_string(),
            name: "Ada".to_string(),
            email: "a@example.com".to_string(),
            token: "token".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("mfaRequired").is_none());
        assert_eq!(json["id"], "id");
        assert_eq!(json["token"], "token");
    }

    #[test]
    fn totp_setup_response_field_names() {
        let response = TotpSetupResponse {
            totp_secret: "secret".to_string(),
            otpauth_url: "otpauth://totp/x".to_string(),
            qr_code_data_url: "data:image/png;base64,abc".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["totpSecret"], "secret");
        assert_eq!(json["otpauthUrl"], "otpauth://totp/x");
        assert_eq!(json["qrCodeDataURL"], "data:image/png;base64,abc");
    }
}
