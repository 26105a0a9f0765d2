//! Artifact store capability

use crate::checksum::Checksum;
use crate::error::StoreError;
use crate::key::ArtifactKey;
use async_trait::async_trait;
use serde::Serialize;

/// Content type of generated lead documents
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Result of a successful `put`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredArtifact {
    pub key: ArtifactKey,
    /// Public location (`<publicBase>/<key>`)
    pub location: String,
    pub checksum: Checksum,
    pub size: u64,
    /// Identical bytes were already stored under the key
    pub unchanged: bool,
}

/// Put bytes, get a durable public location.
///
/// `put` must be idempotent: storing identical bytes under the same key
/// twice succeeds both times and leaves a single object.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Write `bytes` under `key`, replacing any previous object
    async fn put(
        &self,
        key: &ArtifactKey,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<StoredArtifact, StoreError>;

    /// Whether an object exists under `key`
    async fn exists(&self, key: &ArtifactKey) -> Result<bool, StoreError>;

    /// Public location for `key`, whether or not it exists yet
    fn location(&self, key: &ArtifactKey) -> String;

    /// Backend name for logs (`local`, `object`, ...)
    fn backend_name(&self) -> &'static str;
}
