//! Remote-service clients: trait seams, REST implementations, test fakes.

pub mod firestore;
pub mod identity;
pub mod mock;
pub mod storage;
pub mod traits;

pub use firestore::RestDocuments;
pub use identity::RestIdentity;
pub use mock::{MockBlobs, MockDocuments, MockIdentity};
pub use storage::RestBlobs;
pub use traits::{
    BlobError, BlobStore, DocumentStore, IdentityError, IdentityProvider, ProgressObserver,
    StoreError,
};
