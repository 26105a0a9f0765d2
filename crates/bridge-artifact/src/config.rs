//! Backend selection
//!
//! The backend is chosen once, at startup, from [`StorageConfig`]; the
//! pipeline only ever sees `Arc<dyn ArtifactStore>`.

use crate::backend::ArtifactStore;
use crate::error::StoreError;
use crate::local::LocalFsStore;
use crate::object::{ObjectStore, DEFAULT_ACL_HEADER};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

fn default_acl_header() -> Option<String> {
    Some(DEFAULT_ACL_HEADER.to_string())
}

/// Where generated documents are stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Files under `root`, served at `public_base_url`
    Local {
        root: PathBuf,
        public_base_url: String,
    },
    /// Objects in a cloud bucket
    Object {
        endpoint: String,
        bucket: String,
        #[serde(default)]
        public_base_url: Option<String>,
        #[serde(default, skip_serializing)]
        bearer_token: Option<String>,
        /// `name: value`, or null for none
        #[serde(default = "default_acl_header")]
        acl_header: Option<String>,
        #[serde(default)]
        retry: RetryPolicy,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Local {
            root: PathBuf::from("media"),
            public_base_url: "/media".to_string(),
        }
    }
}

impl StorageConfig {
    /// Backend name, matching [`ArtifactStore::backend_name`]
    #[must_use]
    pub const fn backend_name(&self) -> &'static str {
        match self {
            StorageConfig::Local { .. } => "local",
            StorageConfig::Object { .. } => "object",
        }
    }
}

/// Build the configured backend
///
/// # Errors
/// Returns a validation error for unusable object storage settings
pub fn build_artifact_store(config: &StorageConfig) -> Result<Arc<dyn ArtifactStore>, StoreError> {
    let store: Arc<dyn ArtifactStore> = match config {
        StorageConfig::Local {
            root,
            public_base_url,
        } => Arc::new(LocalFsStore::new(root.clone(), public_base_url.clone())),
        StorageConfig::Object {
            endpoint,
            bucket,
            public_base_url,
            bearer_token,
            acl_header,
            retry,
        } => Arc::new(
            ObjectStore::new(endpoint.clone(), bucket.clone())?
                .with_public_base_url(public_base_url.clone())
                .with_bearer_token(bearer_token.clone())
                .with_acl_header(acl_header.as_deref())?
                .with_retry(*retry),
        ),
    };
    tracing::info!(backend = store.backend_name(), "artifact store configured");
    Ok(store)
}
