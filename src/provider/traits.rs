//! Seams for the three remote services.
//!
//! Each hosted service sits behind one trait so the facade can run against
//! the REST clients in production and in-memory fakes in tests. The error
//! enums keep provider-reported messages verbatim: the facade passes them
//! through to callers unmodified.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::watch;

use crate::types::{AuthUser, Progress};

/// Map a non-success response to a service error. All three hosted services
/// report failures as `{ "error": { "message": ... } }`; when the body
/// carries such a message it is passed through verbatim via `provider`,
/// otherwise `fallback` gets the raw status and body.
pub(crate) fn map_provider_error<E>(
    status: StatusCode,
    body: &str,
    provider: impl FnOnce(String) -> E,
    fallback: impl FnOnce(StatusCode, String) -> E,
) -> E {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }
    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if !parsed.error.message.is_empty() => provider(parsed.error.message),
        _ => fallback(status, body.to_string()),
    }
}

/// Error types for identity operations.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// Error reported by the provider; message passed through verbatim
    #[error("{0}")]
    Provider(String),

    /// Request failed without a provider-shaped error body
    #[error("Request failed: HTTP {status}: {body}")]
    RequestFailed { status: u16, body: String },

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Parsing error
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Error types for document store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Error reported by the store; message passed through verbatim
    #[error("{0}")]
    Provider(String),

    /// Request failed without a store-shaped error body
    #[error("Request failed: HTTP {status}: {body}")]
    RequestFailed { status: u16, body: String },

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Parsing error
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Error types for blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// Error reported by the store; message passed through verbatim
    #[error("{0}")]
    Provider(String),

    /// Transfer failed mid-flight. No retry is attempted.
    #[error("Transfer failed: {0}")]
    Transfer(String),

    /// The upload session could not be established
    #[error("Upload session error: {0}")]
    Session(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Parsing error
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Observer invoked after each durably sent chunk of an upload.
pub type ProgressObserver = Arc<dyn Fn(Progress) + Send + Sync>;

/// Identity provider: account lifecycle, sessions, notification emails.
///
/// Implementations own the current session. Sign-in (and account creation,
/// which signs the new account in) publishes the handle on the auth-state
/// channel; sign-out publishes `None`.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Subscribe to auth-state changes. The receiver observes the current
    /// session immediately, then every subsequent change.
    fn auth_state(&self) -> watch::Receiver<Option<AuthUser>>;

    /// Create an account and sign it in.
    async fn create_account(&self, email: &str, password: &str) -> Result<AuthUser, IdentityError>;

    /// Authenticate with email and password.
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, IdentityError>;

    /// Re-send the address-verification email for the given session.
    /// Does not re-check the current verification status.
    async fn send_verification_email(&self, user: &AuthUser) -> Result<(), IdentityError>;

    /// Trigger a password-reset email. Whether the address has an account is
    /// not revealed beyond what the provider itself reports.
    async fn send_password_reset(&self, email: &str) -> Result<(), IdentityError>;

    /// Terminate the current session.
    async fn sign_out(&self) -> Result<(), IdentityError>;
}

/// Document store: schema-flexible records queryable by field equality.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a record; returns the store-assigned id.
    async fn insert(
        &self,
        collection: &str,
        fields: &Map<String, Value>,
    ) -> Result<String, StoreError>;

    /// Point lookup by id. `Ok(None)` when the document does not exist.
    async fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Map<String, Value>>, StoreError>;

    /// Full, unfiltered scan in store-default order.
    async fn list(&self, collection: &str)
        -> Result<Vec<(String, Map<String, Value>)>, StoreError>;

    /// First record whose `field` equals `value`, in store-defined order.
    async fn find_first(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Option<Map<String, Value>>, StoreError>;
}

/// Blob store: byte payloads addressed by path, retrievable by URL.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload bytes to `path`, overwriting any existing object there, and
    /// return a durable download URL. The observer, when given, is invoked
    /// once per transferred chunk.
    async fn put(
        &self,
        path: &str,
        content_type: &str,
        data: Bytes,
        progress: Option<ProgressObserver>,
    ) -> Result<String, BlobError>;
}
