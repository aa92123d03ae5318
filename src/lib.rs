//! Tankobon backend client.
//!
//! Async facade over three hosted services - an identity provider, a
//! schema-flexible document store and a blob store - exposing account,
//! catalog and image-upload operations. Every operation maps its remote
//! outcome into a uniform success/error envelope; callers inspect
//! `success` rather than catching errors.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │               Backend                │
//! │   (facade: one handle per service)   │
//! └───────┬──────────┬──────────┬────────┘
//!         ▼          ▼          ▼
//!  ┌────────────┐ ┌─────────┐ ┌─────────┐
//!  │ Identity   │ │Document │ │ Blob    │
//!  │ Provider   │ │ Store   │ │ Store   │
//!  └────────────┘ └─────────┘ └─────────┘
//!   (REST clients in production, in-memory fakes in tests)
//! ```

pub mod config;
pub mod envelope;
pub mod facade;
pub mod provider;
pub mod types;

// Re-export main types for convenience
pub use config::{BackendConfig, ConfigError};
pub use envelope::{
    DataPayload, IdPayload, LoginOutcome, NoPayload, Outcome, PlainOutcome, UrlPayload, UserPayload,
};
pub use facade::{Backend, IMAGES_PREFIX, MANGA_COLLECTION, USERS_COLLECTION};
pub use provider::{
    BlobError, BlobStore, DocumentStore, IdentityError, IdentityProvider, ProgressObserver,
    StoreError,
};
pub use types::{AuthUser, MangaRecord, Progress, UserProfile};
