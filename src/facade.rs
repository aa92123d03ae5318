//! Backend facade - the public operation surface.
//!
//! One explicitly constructed context holding a shared handle per remote
//! service. Every operation issues its remote call(s), catches any failure
//! and maps the outcome into the uniform envelope; nothing here panics or
//! returns `Err` once the facade is built.

use bytes::Bytes;
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{BackendConfig, ConfigError};
use crate::envelope::{
    DataPayload, IdPayload, LoginOutcome, NoPayload, Outcome, PlainOutcome, UrlPayload, UserPayload,
};
use crate::provider::{
    BlobStore, DocumentStore, IdentityProvider, ProgressObserver, RestBlobs, RestDocuments,
    RestIdentity,
};
use crate::types::{AuthUser, MangaRecord, UserProfile};

/// Collection holding user profile records.
pub const USERS_COLLECTION: &str = "users";
/// Collection holding catalog records.
pub const MANGA_COLLECTION: &str = "manga";
/// Path prefix uploads are keyed under.
pub const IMAGES_PREFIX: &str = "images";

/// Client facade over the hosted identity, document and blob services.
///
/// The three handles are set at construction and never reassigned; clones
/// share them.
#[derive(Clone)]
pub struct Backend {
    identity: Arc<dyn IdentityProvider>,
    documents: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
}

impl Backend {
    /// Build the facade against the hosted services. A bad configuration is
    /// fatal here; operation calls never report it.
    pub fn connect(config: &BackendConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        info!(project_id = %config.project_id, "connecting backend clients");
        Ok(Self {
            identity: Arc::new(RestIdentity::new(
                client.clone(),
                &config.identity_url,
                &config.api_key,
            )),
            documents: Arc::new(RestDocuments::new(
                client.clone(),
                &config.firestore_url,
                &config.project_id,
                &config.api_key,
            )),
            blobs: Arc::new(RestBlobs::new(
                client,
                &config.storage_url,
                &config.storage_bucket,
            )),
        })
    }

    /// Build the facade from explicit providers. This is the seam tests use
    /// to run the facade against fakes.
    pub fn with_providers(
        identity: Arc<dyn IdentityProvider>,
        documents: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            identity,
            documents,
            blobs,
        }
    }

    /// Create an account, trigger the verification email, then write the
    /// profile record.
    ///
    /// The three remote calls run sequentially and are not transactional:
    /// if a later step fails the account created by the first one persists
    /// at the identity provider. That inconsistency window is accepted
    /// behavior; it is logged but not rolled back.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Outcome<UserPayload> {
        let user = match self.identity.create_account(email, password).await {
            Ok(user) => user,
            Err(e) => return Outcome::err(e.to_string()),
        };

        if let Err(e) = self.identity.send_verification_email(&user).await {
            warn!(uid = %user.uid, error = %e, "verification email failed after account creation; account persists");
            return Outcome::err(e.to_string());
        }

        let profile = UserProfile {
            uid: user.uid.clone(),
            username: username.to_string(),
            email: email.to_string(),
            email_verified: false,
            created_at: Utc::now().to_rfc3339(),
        };
        let fields = match profile_fields(&profile) {
            Ok(fields) => fields,
            Err(message) => return Outcome::err(message),
        };
        if let Err(e) = self.documents.insert(USERS_COLLECTION, &fields).await {
            warn!(uid = %user.uid, error = %e, "profile write failed after account creation; account persists");
            return Outcome::err(e.to_string());
        }

        info!(uid = %user.uid, "user registered");
        Outcome::ok(UserPayload { user })
    }

    /// Authenticate. An unverified email is a recoverable outcome carrying
    /// the user handle and `needsVerification`, not a hard error.
    pub async fn login(&self, email: &str, password: &str) -> LoginOutcome {
        match self.identity.sign_in(email, password).await {
            Ok(user) if user.email_verified => {
                debug!(uid = %user.uid, "login succeeded");
                LoginOutcome::verified(user)
            }
            Ok(user) => {
                debug!(uid = %user.uid, "login blocked on unverified email");
                LoginOutcome::unverified(user)
            }
            Err(e) => LoginOutcome::failed(e.to_string()),
        }
    }

    /// Re-send the verification email for an authenticated-but-unverified
    /// user. The current verification status is not re-checked.
    pub async fn resend_verification_email(&self, user: &AuthUser) -> PlainOutcome {
        match self.identity.send_verification_email(user).await {
            Ok(()) => Outcome::ok(NoPayload {}),
            Err(e) => Outcome::err(e.to_string()),
        }
    }

    /// Trigger a password-reset email. Whether the address has an account
    /// is not revealed beyond what the provider itself reports.
    pub async fn request_password_reset(&self, email: &str) -> PlainOutcome {
        match self.identity.send_password_reset(email).await {
            Ok(()) => Outcome::ok(NoPayload {}),
            Err(e) => Outcome::err(e.to_string()),
        }
    }

    /// Terminate the current session.
    pub async fn logout(&self) -> PlainOutcome {
        match self.identity.sign_out().await {
            Ok(()) => Outcome::ok(NoPayload {}),
            Err(e) => Outcome::err(e.to_string()),
        }
    }

    /// One-shot snapshot of the current session: subscribe to the
    /// auth-state stream, take the first (current) value, drop the
    /// subscription. Never fails; resolves `None` without a session.
    pub async fn current_user(&self) -> Option<AuthUser> {
        let receiver = self.identity.auth_state();
        let user = receiver.borrow().clone();
        drop(receiver);
        user
    }

    /// First profile record whose `uid` field matches. Which record is
    /// first among duplicates is store-defined.
    pub async fn user_profile(&self, uid: &str) -> Outcome<DataPayload<UserProfile>> {
        let lookup = self
            .documents
            .find_first(USERS_COLLECTION, "uid", &Value::String(uid.to_string()))
            .await;
        match lookup {
            Ok(Some(fields)) => match serde_json::from_value(Value::Object(fields)) {
                Ok(profile) => Outcome::ok(DataPayload { data: profile }),
                Err(e) => Outcome::err(format!("Malformed profile record: {}", e)),
            },
            Ok(None) => Outcome::err("User not found"),
            Err(e) => Outcome::err(e.to_string()),
        }
    }

    /// Full, unfiltered scan of the catalog, ids merged in. Order is
    /// store-defined.
    pub async fn all_manga(&self) -> Outcome<DataPayload<Vec<MangaRecord>>> {
        match self.documents.list(MANGA_COLLECTION).await {
            Ok(records) => {
                let records = records
                    .into_iter()
                    .map(|(id, fields)| MangaRecord::stored(id, fields))
                    .collect();
                Outcome::ok(DataPayload { data: records })
            }
            Err(e) => Outcome::err(e.to_string()),
        }
    }

    /// Point lookup of one catalog record.
    pub async fn manga_by_id(&self, id: &str) -> Outcome<DataPayload<MangaRecord>> {
        match self.documents.get(MANGA_COLLECTION, id).await {
            Ok(Some(fields)) => Outcome::ok(DataPayload {
                data: MangaRecord::stored(id, fields),
            }),
            Ok(None) => Outcome::err("Manga not found"),
            Err(e) => Outcome::err(e.to_string()),
        }
    }

    /// Insert a catalog record. Any field shape is accepted and forwarded
    /// as-is; no schema validation happens here.
    pub async fn add_manga(&self, fields: Map<String, Value>) -> Outcome<IdPayload> {
        match self.documents.insert(MANGA_COLLECTION, &fields).await {
            Ok(id) => {
                debug!(id = %id, "catalog record added");
                Outcome::ok(IdPayload { id })
            }
            Err(e) => Outcome::err(e.to_string()),
        }
    }

    /// Upload image bytes under `images/{file_name}`. Two uploads sharing a
    /// name overwrite the same object, last writer wins. Progress is logged
    /// and, when an observer is given, reported per chunk; a failed
    /// transfer is not retried.
    pub async fn upload_image(
        &self,
        file_name: &str,
        content_type: &str,
        data: Bytes,
        progress: Option<ProgressObserver>,
    ) -> Outcome<UrlPayload> {
        let path = format!("{}/{}", IMAGES_PREFIX, file_name);
        match self.blobs.put(&path, content_type, data, progress).await {
            Ok(url) => Outcome::ok(UrlPayload { url }),
            Err(e) => Outcome::err(e.to_string()),
        }
    }
}

fn profile_fields(profile: &UserProfile) -> Result<Map<String, Value>, String> {
    match serde_json::to_value(profile) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) | Err(_) => Err("Failed to encode profile record".to_string()),
    }
}
