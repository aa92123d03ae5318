//! Observable-contract tests for the backend facade, run against the
//! in-memory service fakes.

use bytes::Bytes;
use serde_json::json;
use std::sync::Arc;

use tankobon_backend::provider::{
    BlobStore, DocumentStore, IdentityProvider, MockBlobs, MockDocuments, MockIdentity,
};
use tankobon_backend::Backend;

struct Harness {
    backend: Backend,
    identity: Arc<MockIdentity>,
    blobs: Arc<MockBlobs>,
}

fn harness() -> Harness {
    harness_with_identity(MockIdentity::new())
}

fn harness_with_identity(identity: MockIdentity) -> Harness {
    let identity = Arc::new(identity);
    let documents = Arc::new(MockDocuments::new());
    let blobs = Arc::new(MockBlobs::new());
    let backend = Backend::with_providers(
        identity.clone() as Arc<dyn IdentityProvider>,
        documents as Arc<dyn DocumentStore>,
        blobs.clone() as Arc<dyn BlobStore>,
    );
    Harness {
        backend,
        identity,
        blobs,
    }
}

#[tokio::test]
async fn register_then_profile_lookup_yields_unverified_profile() {
    let h = harness();
    let before = chrono::Utc::now();

    let registered = h.backend.register("a@b.c", "hunter22", "reader").await;
    assert!(registered.success, "register failed: {:?}", registered.error);
    let uid = registered.payload.unwrap().user.uid;

    let profile = h.backend.user_profile(&uid).await;
    assert!(profile.success);
    let profile = profile.payload.unwrap().data;
    assert!(!profile.email_verified);
    assert_eq!(profile.username, "reader");

    let created_at = chrono::DateTime::parse_from_rfc3339(&profile.created_at)
        .expect("createdAt must be a parseable timestamp");
    assert!(created_at >= before - chrono::Duration::seconds(1));
}

#[tokio::test]
async fn login_unverified_never_succeeds() {
    let h = harness_with_identity(MockIdentity::new().with_account("a@b.c", "hunter22", false));

    let outcome = h.backend.login("a@b.c", "hunter22").await;
    assert!(!outcome.success);
    assert!(outcome.needs_verification);
    assert_eq!(outcome.user.unwrap().email, "a@b.c");
}

#[tokio::test]
async fn login_verified_yields_matching_identity() {
    let h = harness_with_identity(MockIdentity::new().with_account("a@b.c", "hunter22", true));

    let outcome = h.backend.login("a@b.c", "hunter22").await;
    assert!(outcome.success);
    assert!(!outcome.needs_verification);
    assert_eq!(outcome.user.unwrap().email, "a@b.c");
}

#[tokio::test]
async fn login_with_wrong_password_passes_provider_message_through() {
    let h = harness_with_identity(MockIdentity::new().with_account("a@b.c", "hunter22", true));

    let outcome = h.backend.login("a@b.c", "wrong").await;
    assert!(!outcome.success);
    assert!(!outcome.needs_verification);
    assert_eq!(outcome.error.as_deref(), Some("INVALID_LOGIN_CREDENTIALS"));
}

#[tokio::test]
async fn added_manga_reads_back_with_submitted_fields() {
    let h = harness();
    let fields = json!({ "title": "Akira", "volumes": 6 });
    let fields = fields.as_object().unwrap().clone();

    let added = h.backend.add_manga(fields.clone()).await;
    assert!(added.success);
    let id = added.payload.unwrap().id;

    let fetched = h.backend.manga_by_id(&id).await;
    assert!(fetched.success);
    let record = fetched.payload.unwrap().data;
    assert_eq!(record.id.as_deref(), Some(id.as_str()));
    assert_eq!(record.fields, fields);
}

#[tokio::test]
async fn missing_manga_reports_fixed_message() {
    let h = harness();
    let outcome = h.backend.manga_by_id("no-such-id").await;
    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some("Manga not found"));
}

#[tokio::test]
async fn catalog_scan_includes_every_added_record() {
    let h = harness();
    let mut ids = Vec::new();
    for n in 0..5 {
        let fields = json!({ "n": n }).as_object().unwrap().clone();
        let added = h.backend.add_manga(fields).await;
        ids.push(added.payload.unwrap().id);
    }

    let listed = h.backend.all_manga().await;
    assert!(listed.success);
    let records = listed.payload.unwrap().data;
    for id in &ids {
        assert!(
            records.iter().any(|r| r.id.as_deref() == Some(id.as_str())),
            "record {} lost from scan",
            id
        );
    }
}

#[tokio::test]
async fn upload_with_same_name_is_last_writer_wins() {
    let h = harness();

    let first = h
        .backend
        .upload_image("cover.png", "image/png", Bytes::from_static(b"first"), None)
        .await;
    let second = h
        .backend
        .upload_image("cover.png", "image/png", Bytes::from_static(b"second"), None)
        .await;
    assert!(first.success && second.success);
    assert_eq!(
        first.payload.unwrap().url,
        second.payload.unwrap().url,
        "same name must map to the same location"
    );

    let stored = h.blobs.object("images/cover.png").await.unwrap();
    assert_eq!(stored.as_ref(), b"second");
}

#[tokio::test]
async fn current_user_without_session_resolves_empty() {
    let h = harness();
    assert!(h.backend.current_user().await.is_none());
}

#[tokio::test]
async fn current_user_tracks_login_and_logout() {
    let h = harness_with_identity(MockIdentity::new().with_account("a@b.c", "hunter22", true));

    assert!(h.backend.current_user().await.is_none());

    h.backend.login("a@b.c", "hunter22").await;
    let snapshot = h.backend.current_user().await.unwrap();
    assert_eq!(snapshot.email, "a@b.c");

    let logout = h.backend.logout().await;
    assert!(logout.success);
    assert!(h.backend.current_user().await.is_none());
}

#[tokio::test]
async fn current_user_drops_its_subscription_after_resolving() {
    let h = harness_with_identity(MockIdentity::new().with_account("a@b.c", "hunter22", true));
    let before = h.identity.auth_state_receivers();

    h.backend.login("a@b.c", "hunter22").await;
    let snapshot = h.backend.current_user().await;
    assert!(snapshot.is_some());

    assert_eq!(
        h.identity.auth_state_receivers(),
        before,
        "current_user must not leave a live subscription behind"
    );
}

#[tokio::test]
async fn resend_verification_reaches_provider() {
    let h = harness_with_identity(MockIdentity::new().with_account("a@b.c", "hunter22", false));

    let login = h.backend.login("a@b.c", "hunter22").await;
    assert!(login.needs_verification);
    let user = login.user.unwrap();

    let outcome = h.backend.resend_verification_email(&user).await;
    assert!(outcome.success);
    assert_eq!(h.identity.verification_emails_sent(), 1);
}

#[tokio::test]
async fn password_reset_reports_success_without_account_detail() {
    let h = harness();
    let outcome = h.backend.request_password_reset("nobody@b.c").await;
    assert!(outcome.success);
    assert_eq!(h.identity.password_resets_sent(), 1);
}

#[tokio::test]
async fn failed_upload_is_enveloped_not_thrown() {
    let h = harness();
    h.blobs.set_fail_uploads(true);

    let outcome = h
        .backend
        .upload_image("cover.png", "image/png", Bytes::from_static(b"x"), None)
        .await;
    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("mock upload failed"));
}
