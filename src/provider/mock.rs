//! In-memory fakes for the three remote services.
//!
//! Configurable behavior for unit tests: pre-seeded accounts, switchable
//! failures, call counters.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::{watch, RwLock};

use super::traits::{
    BlobError, BlobStore, DocumentStore, IdentityError, IdentityProvider, ProgressObserver,
    StoreError,
};
use crate::types::{AuthUser, Progress};

struct MockAccount {
    password: String,
    user: AuthUser,
}

/// Mock identity provider with an in-memory account table.
pub struct MockIdentity {
    accounts: RwLock<HashMap<String, MockAccount>>,
    session: watch::Sender<Option<AuthUser>>,
    verification_emails: AtomicU32,
    password_resets: AtomicU32,
}

impl MockIdentity {
    /// Create an empty provider with no accounts and no session.
    pub fn new() -> Self {
        let (session, _) = watch::channel(None);
        Self {
            accounts: RwLock::new(HashMap::new()),
            session,
            verification_emails: AtomicU32::new(0),
            password_resets: AtomicU32::new(0),
        }
    }

    /// Pre-seed an account.
    pub fn with_account(mut self, email: &str, password: &str, verified: bool) -> Self {
        let mut user = AuthUser::unverified(
            format!("uid-{}", email),
            email,
            format!("token-{}", email),
        );
        user.email_verified = verified;
        self.accounts.get_mut().insert(
            email.to_string(),
            MockAccount {
                password: password.to_string(),
                user,
            },
        );
        self
    }

    /// Flip an existing account to verified.
    pub async fn mark_verified(&self, email: &str) {
        let mut accounts = self.accounts.write().await;
        if let Some(account) = accounts.get_mut(email) {
            account.user.email_verified = true;
        }
    }

    /// Number of verification emails requested.
    pub fn verification_emails_sent(&self) -> u32 {
        self.verification_emails.load(Ordering::SeqCst)
    }

    /// Number of password resets requested.
    pub fn password_resets_sent(&self) -> u32 {
        self.password_resets.load(Ordering::SeqCst)
    }

    /// Number of live auth-state subscriptions.
    pub fn auth_state_receivers(&self) -> usize {
        self.session.receiver_count()
    }
}

impl Default for MockIdentity {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for MockIdentity {
    fn auth_state(&self) -> watch::Receiver<Option<AuthUser>> {
        self.session.subscribe()
    }

    async fn create_account(&self, email: &str, password: &str) -> Result<AuthUser, IdentityError> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(email) {
            return Err(IdentityError::Provider("EMAIL_EXISTS".to_string()));
        }
        if password.len() < 6 {
            return Err(IdentityError::Provider(
                "WEAK_PASSWORD : Password should be at least 6 characters".to_string(),
            ));
        }

        let user = AuthUser::unverified(
            uuid::Uuid::new_v4().simple().to_string(),
            email,
            uuid::Uuid::new_v4().simple().to_string(),
        );
        accounts.insert(
            email.to_string(),
            MockAccount {
                password: password.to_string(),
                user: user.clone(),
            },
        );
        self.session.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, IdentityError> {
        let accounts = self.accounts.read().await;
        let account = accounts
            .get(email)
            .filter(|a| a.password == password)
            .ok_or_else(|| IdentityError::Provider("INVALID_LOGIN_CREDENTIALS".to_string()))?;

        let user = account.user.clone();
        self.session.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn send_verification_email(&self, user: &AuthUser) -> Result<(), IdentityError> {
        let accounts = self.accounts.read().await;
        if !accounts.contains_key(&user.email) {
            return Err(IdentityError::Provider("USER_NOT_FOUND".to_string()));
        }
        self.verification_emails.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send_password_reset(&self, _email: &str) -> Result<(), IdentityError> {
        self.password_resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.session.send_replace(None);
        Ok(())
    }
}

/// Mock document store keeping records in insertion order.
pub struct MockDocuments {
    collections: RwLock<HashMap<String, Vec<(String, Map<String, Value>)>>>,
    fail_inserts: AtomicBool,
    insert_count: AtomicU32,
}

impl MockDocuments {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            fail_inserts: AtomicBool::new(false),
            insert_count: AtomicU32::new(0),
        }
    }

    /// Make every subsequent insert fail.
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Number of successful inserts.
    pub fn insert_count(&self) -> u32 {
        self.insert_count.load(Ordering::SeqCst)
    }
}

impl Default for MockDocuments {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MockDocuments {
    async fn insert(
        &self,
        collection: &str,
        fields: &Map<String, Value>,
    ) -> Result<String, StoreError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Provider("PERMISSION_DENIED".to_string()));
        }
        let id = uuid::Uuid::new_v4().simple().to_string();
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .push((id.clone(), fields.clone()));
        self.insert_count.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Map<String, Value>>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|records| {
            records
                .iter()
                .find(|(record_id, _)| record_id == id)
                .map(|(_, fields)| fields.clone())
        }))
    }

    async fn list(
        &self,
        collection: &str,
    ) -> Result<Vec<(String, Map<String, Value>)>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).cloned().unwrap_or_default())
    }

    async fn find_first(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Option<Map<String, Value>>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|records| {
            records
                .iter()
                .find(|(_, fields)| fields.get(field) == Some(value))
                .map(|(_, fields)| fields.clone())
        }))
    }
}

/// Mock blob store. Objects live in memory; URLs use a `mock://` scheme.
pub struct MockBlobs {
    objects: RwLock<HashMap<String, Bytes>>,
    fail_uploads: AtomicBool,
    upload_count: AtomicU32,
}

impl MockBlobs {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            fail_uploads: AtomicBool::new(false),
            upload_count: AtomicU32::new(0),
        }
    }

    /// Make every subsequent upload fail.
    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// Number of completed uploads.
    pub fn upload_count(&self) -> u32 {
        self.upload_count.load(Ordering::SeqCst)
    }

    /// Fetch the stored bytes for a path, as a download of the URL would.
    pub async fn object(&self, path: &str) -> Option<Bytes> {
        self.objects.read().await.get(path).cloned()
    }
}

impl Default for MockBlobs {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for MockBlobs {
    async fn put(
        &self,
        path: &str,
        _content_type: &str,
        data: Bytes,
        progress: Option<ProgressObserver>,
    ) -> Result<String, BlobError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(BlobError::Transfer("mock upload failed".to_string()));
        }
        let total = data.len() as u64;
        let mut objects = self.objects.write().await;
        objects.insert(path.to_string(), data);
        self.upload_count.fetch_add(1, Ordering::SeqCst);
        if let Some(observer) = progress {
            observer(Progress {
                bytes_transferred: total,
                total_bytes: total,
            });
        }
        Ok(format!("mock://{}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let identity = MockIdentity::new().with_account("a@b.c", "hunter22", false);
        let result = identity.create_account("a@b.c", "hunter22").await;
        assert_eq!(result.unwrap_err().to_string(), "EMAIL_EXISTS");
    }

    #[tokio::test]
    async fn test_sign_in_publishes_session() {
        let identity = MockIdentity::new().with_account("a@b.c", "hunter22", true);
        let state = identity.auth_state();
        assert!(state.borrow().is_none());

        identity.sign_in("a@b.c", "hunter22").await.unwrap();
        assert_eq!(
            state.borrow().as_ref().map(|u| u.email.clone()),
            Some("a@b.c".to_string())
        );
    }

    #[tokio::test]
    async fn test_documents_keep_insertion_order() {
        let documents = MockDocuments::new();
        let first = documents
            .insert("manga", json!({ "n": 1 }).as_object().unwrap())
            .await
            .unwrap();
        let second = documents
            .insert("manga", json!({ "n": 2 }).as_object().unwrap())
            .await
            .unwrap();

        let listed = documents.list("manga").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].0, first);
        assert_eq!(listed[1].0, second);
    }

    #[tokio::test]
    async fn test_blob_overwrite_is_last_writer_wins() {
        let blobs = MockBlobs::new();
        blobs
            .put("images/a.png", "image/png", Bytes::from_static(b"one"), None)
            .await
            .unwrap();
        blobs
            .put("images/a.png", "image/png", Bytes::from_static(b"two"), None)
            .await
            .unwrap();

        assert_eq!(blobs.object("images/a.png").await.unwrap().as_ref(), b"two");
        assert_eq!(blobs.upload_count(), 2);
    }
}
