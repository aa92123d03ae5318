//! Uniform result envelope returned by every facade operation.
//!
//! Invariants: a failed outcome always carries a non-empty human-readable
//! error message; a successful outcome always carries its declared payload
//! and no error. Remote failures never escape as panics or `Err`; callers
//! inspect `success`.

use serde::Serialize;

use crate::types::AuthUser;

/// Generic success/error envelope. The payload struct supplies the field
/// name under which its content serializes (`data`, `id`, `url`, `user`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome<P> {
    /// Whether the operation succeeded
    pub success: bool,
    /// Operation payload, flattened into the envelope on success
    #[serde(flatten)]
    pub payload: Option<P>,
    /// Human-readable failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<P> Outcome<P> {
    /// Successful outcome with its payload.
    pub fn ok(payload: P) -> Self {
        Self {
            success: true,
            payload: Some(payload),
            error: None,
        }
    }

    /// Failed outcome. An empty message is replaced with a generic one so
    /// the non-empty-error invariant holds.
    pub fn err(message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.is_empty() {
            "Unknown error".to_string()
        } else {
            message
        };
        Self {
            success: false,
            payload: None,
            error: Some(message),
        }
    }
}

/// Payload carrying a user handle, serialized as `user`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserPayload {
    pub user: AuthUser,
}

/// Payload carrying operation data, serialized as `data`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataPayload<T> {
    pub data: T,
}

/// Payload carrying a store-assigned id, serialized as `id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdPayload {
    pub id: String,
}

/// Payload carrying a download URL, serialized as `url`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UrlPayload {
    pub url: String,
}

/// Empty payload for operations with no success data (logout, resets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NoPayload {}

/// Envelope for operations that report only success or failure.
pub type PlainOutcome = Outcome<NoPayload>;

/// Login has a third, recoverable outcome: credentials were accepted but the
/// email is unverified. Callers branch on `needs_verification` rather than
/// treating it as a hard error, so it gets its own shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutcome {
    /// Whether login fully succeeded
    pub success: bool,
    /// User handle; present on success and on the unverified-email path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<AuthUser>,
    /// Set when credentials were valid but the email is unverified
    #[serde(skip_serializing_if = "is_false")]
    pub needs_verification: bool,
    /// Human-readable failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl LoginOutcome {
    /// Credentials valid, email verified.
    pub fn verified(user: AuthUser) -> Self {
        Self {
            success: true,
            user: Some(user),
            needs_verification: false,
            error: None,
        }
    }

    /// Credentials valid, email not yet verified.
    pub fn unverified(user: AuthUser) -> Self {
        Self {
            success: false,
            user: Some(user),
            needs_verification: true,
            error: Some(
                "Email not verified. Please check your inbox and verify your email.".to_string(),
            ),
        }
    }

    /// Credentials rejected or the call failed.
    pub fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.is_empty() {
            "Unknown error".to_string()
        } else {
            message
        };
        Self {
            success: false,
            user: None,
            needs_verification: false,
            error: Some(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ok_flattens_payload() {
        let outcome = Outcome::ok(IdPayload {
            id: "doc-1".to_string(),
        });
        let encoded = serde_json::to_value(&outcome).unwrap();
        assert_eq!(encoded, json!({ "success": true, "id": "doc-1" }));
    }

    #[test]
    fn test_err_always_has_message() {
        let outcome: PlainOutcome = Outcome::err("");
        assert_eq!(outcome.error.as_deref(), Some("Unknown error"));
        assert!(!outcome.success);

        let outcome: PlainOutcome = Outcome::err("EMAIL_EXISTS");
        assert_eq!(outcome.error.as_deref(), Some("EMAIL_EXISTS"));
    }

    #[test]
    fn test_err_omits_payload_fields() {
        let outcome: Outcome<UrlPayload> = Outcome::err("upload failed");
        let encoded = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            encoded,
            json!({ "success": false, "error": "upload failed" })
        );
    }

    #[test]
    fn test_login_unverified_shape() {
        let user = AuthUser::unverified("u1", "a@b.c", "tok");
        let outcome = LoginOutcome::unverified(user);
        let encoded = serde_json::to_value(&outcome).unwrap();

        assert_eq!(encoded["success"], json!(false));
        assert_eq!(encoded["needsVerification"], json!(true));
        assert_eq!(encoded["user"]["uid"], json!("u1"));
        assert!(encoded["error"].as_str().unwrap().contains("not verified"));
    }

    #[test]
    fn test_login_verified_omits_flag() {
        let mut user = AuthUser::unverified("u1", "a@b.c", "tok");
        user.email_verified = true;
        let encoded = serde_json::to_value(&LoginOutcome::verified(user)).unwrap();

        assert_eq!(encoded["success"], json!(true));
        assert!(encoded.get("needsVerification").is_none());
        assert!(encoded.get("error").is_none());
    }
}
