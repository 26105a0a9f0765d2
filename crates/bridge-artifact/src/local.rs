//! Local filesystem backend
//!
//! Objects live at `<root>/<key>`. Writes go to a sibling temp file that is
//! renamed into place, so readers never observe a partial document. The
//! write runs to completion on the blocking pool even if the caller stops
//! waiting; the temp file is either persisted or removed on drop.

use crate::backend::{ArtifactStore, StoredArtifact};
use crate::checksum::Checksum;
use crate::error::{StoreError, StoreErrorCode};
use crate::key::{check_key, public_url, ArtifactKey};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Stores artifacts under a directory served at `public_base_url`
#[derive(Debug, Clone)]
pub struct LocalFsStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalFsStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of `key`
    #[must_use]
    pub fn path_for(&self, key: &ArtifactKey) -> PathBuf {
        key.as_str()
            .split('/')
            .fold(self.root.clone(), |path, seg| path.join(seg))
    }

    async fn existing_checksum(path: &Path) -> Result<Option<Checksum>, StoreError> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(Checksum::of(&bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let prefix = format!(
        ".{}.",
        path.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned())
    );
    let mut tmp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl ArtifactStore for LocalFsStore {
    async fn put(
        &self,
        key: &ArtifactKey,
        bytes: &[u8],
        _content_type: &str,
    ) -> Result<StoredArtifact, StoreError> {
        check_key(key.as_str())?;
        let path = self.path_for(key);
        let checksum = Checksum::of(bytes);
        let size = bytes.len() as u64;
        let location = self.location(key);

        if Self::existing_checksum(&path).await? == Some(checksum) {
            tracing::debug!(%key, checksum = %checksum.short(), "identical artifact already stored");
            return Ok(StoredArtifact {
                key: key.clone(),
                location,
                checksum,
                size,
                unchanged: true,
            });
        }

        let owned = bytes.to_vec();
        tokio::task::spawn_blocking(move || write_atomically(&path, &owned))
            .await
            .map_err(|e| StoreError::new(StoreErrorCode::Internal, e.to_string()))??;

        tracing::debug!(%key, size, checksum = %checksum.short(), "artifact written");
        Ok(StoredArtifact {
            key: key.clone(),
            location,
            checksum,
            size,
            unchanged: false,
        })
    }

    async fn exists(&self, key: &ArtifactKey) -> Result<bool, StoreError> {
        check_key(key.as_str())?;
        Ok(fs::try_exists(self.path_for(key)).await?)
    }

    fn location(&self, key: &ArtifactKey) -> String {
        public_url(&self.public_base_url, key.as_str())
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
