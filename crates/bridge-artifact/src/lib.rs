//! Bridge artifact storage
//!
//! "Put bytes, get a durable public location" for generated lead documents,
//! with a local filesystem backend and a cloud object storage backend that
//! satisfy the same contract.
//!
//! # Core Concepts
//!
//! - [`ArtifactKey`]: deterministic key derived from reference, category and date
//! - [`ArtifactStore`]: `put`/`exists` capability, idempotent on identical bytes
//! - [`Checksum`]: Blake3 digest recorded for every stored document
//! - [`StorageConfig`]: startup-time backend selection
//!
//! # Example
//!
//! ```rust
//! use bridge_artifact::{ArtifactKey, ArtifactStore, LocalFsStore, PDF_CONTENT_TYPE};
//!
//! # tokio_test_block(async {
//! let dir = std::env::temp_dir().join("bridge-artifact-doc");
//! let store = LocalFsStore::new(&dir, "/media");
//! let key = ArtifactKey::parse("lead_pdfs/2025/01/LI-2025-1_life_20250101.pdf").unwrap();
//! let stored = store.put(&key, b"%PDF-1.5", PDF_CONTENT_TYPE).await.unwrap();
//! assert_eq!(stored.location, "/media/lead_pdfs/2025/01/LI-2025-1_life_20250101.pdf");
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod backend;
mod checksum;
mod config;
mod error;
mod key;
mod local;
mod object;
mod retry;

pub use backend::{ArtifactStore, StoredArtifact, PDF_CONTENT_TYPE};
pub use checksum::{Checksum, ChecksumError};
pub use config::{build_artifact_store, StorageConfig};
pub use error::{StoreError, StoreErrorCode};
pub use key::{public_url, ArtifactKey, ARTIFACT_ROOT};
pub use local::LocalFsStore;
pub use object::{ObjectStore, DEFAULT_ACL_HEADER};
pub use retry::RetryPolicy;
