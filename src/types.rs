//! Shared data types passed through to and from the hosted services.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Authenticated user handle returned by the identity provider.
///
/// Carries the session token the provider issued at sign-in; the token is
/// what later per-user calls (resending the verification email) authenticate
/// with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    /// Provider-assigned user id
    pub uid: String,
    /// Email address the account was created with
    pub email: String,
    /// Whether the provider has confirmed the email address
    pub email_verified: bool,
    /// Session token issued by the provider
    pub id_token: String,
}

impl AuthUser {
    /// Create a handle for a freshly created, unverified account.
    pub fn unverified(
        uid: impl Into<String>,
        email: impl Into<String>,
        id_token: impl Into<String>,
    ) -> Self {
        Self {
            uid: uid.into(),
            email: email.into(),
            email_verified: false,
            id_token: id_token.into(),
        }
    }
}

/// Profile record written to the document store at registration.
///
/// Field names mirror the stored document (`emailVerified`, `createdAt`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Identity-provider uid this profile belongs to
    pub uid: String,
    /// Display name chosen at registration
    pub username: String,
    /// Email address at registration time
    pub email: String,
    /// Verification state at the time the profile was written
    pub email_verified: bool,
    /// RFC 3339 creation timestamp
    pub created_at: String,
}

/// A catalog record: a store-assigned id plus an open field map.
///
/// The document store accepts arbitrary shapes by contract, so this is a
/// deliberately dynamic document type rather than a fixed schema. The id is
/// absent until the store assigns one at insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MangaRecord {
    /// Store-assigned document id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Record fields, forwarded as-is
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl MangaRecord {
    /// Create a record that has not been stored yet.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { id: None, fields }
    }

    /// Create a record as read back from the store.
    pub fn stored(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: Some(id.into()),
            fields,
        }
    }

    /// Look up a field by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// Transfer progress for a blob upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// Bytes durably sent so far
    pub bytes_transferred: u64,
    /// Total size of the payload
    pub total_bytes: u64,
}

impl Progress {
    /// Percent complete, 0.0 to 100.0.
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            100.0
        } else {
            (self.bytes_transferred as f64 / self.total_bytes as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_manga_record_flattens_fields() {
        let mut fields = Map::new();
        fields.insert("title".to_string(), json!("One Piece"));
        fields.insert("volumes".to_string(), json!(108));

        let record = MangaRecord::stored("abc123", fields);
        let encoded = serde_json::to_value(&record).unwrap();

        assert_eq!(encoded["id"], json!("abc123"));
        assert_eq!(encoded["title"], json!("One Piece"));
        assert_eq!(encoded["volumes"], json!(108));
    }

    #[test]
    fn test_manga_record_without_id_omits_it() {
        let record = MangaRecord::new(Map::new());
        let encoded = serde_json::to_value(&record).unwrap();
        assert!(encoded.get("id").is_none());
    }

    #[test]
    fn test_progress_percent() {
        let progress = Progress {
            bytes_transferred: 256,
            total_bytes: 1024,
        };
        assert!((progress.percent() - 25.0).abs() < f64::EPSILON);

        let empty = Progress {
            bytes_transferred: 0,
            total_bytes: 0,
        };
        assert!((empty.percent() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_auth_user_serializes_camel_case() {
        let user = AuthUser::unverified("u1", "a@b.c", "tok");
        let encoded = serde_json::to_value(&user).unwrap();
        assert_eq!(encoded["emailVerified"], json!(false));
        assert_eq!(encoded["idToken"], json!("tok"));
    }
}
