//! Deterministic artifact keys
//!
//! `lead_pdfs/<YYYY>/<MM>/<reference>_<slug>_<YYYYMMDD>.pdf`, derived only
//! from the lead's reference, category slug and creation date, so a
//! re-rendered document lands on the same key.

use crate::error::{StoreError, StoreErrorCode};
use bridge_model::{Lead, ProductCategory, ReferenceNumber};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::{self, Display, Formatter};

/// Top-level prefix for generated lead documents
pub const ARTIFACT_ROOT: &str = "lead_pdfs";

/// Storage key of a lead document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ArtifactKey(String);

impl ArtifactKey {
    /// Derive the key from its inputs
    #[must_use]
    pub fn derive(
        reference: &ReferenceNumber,
        category: &ProductCategory,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self(format!(
            "{ARTIFACT_ROOT}/{}/{reference}_{}_{}.pdf",
            created_at.format("%Y/%m"),
            category.file_slug(),
            created_at.format("%Y%m%d"),
        ))
    }

    /// Key of `lead`'s document
    #[inline]
    #[must_use]
    pub fn for_lead(lead: &Lead) -> Self {
        Self::derive(&lead.reference_number, &lead.category, lead.created_at)
    }

    /// Accept an externally supplied key after checking it stays relative
    ///
    /// # Errors
    /// Returns a validation error for empty, absolute or `..`-containing keys
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        check_key(raw)?;
        Ok(Self(raw.to_string()))
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final path segment
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl Display for ArtifactKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ArtifactKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Reject keys that could escape a storage root
pub(crate) fn check_key(key: &str) -> Result<(), StoreError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(StoreError::new(
            StoreErrorCode::Validation,
            format!("invalid artifact key: {key:?}"),
        ));
    }
    Ok(())
}

/// `<base>/<key>` with exactly one slash between them
#[must_use]
pub fn public_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.trim_start_matches('/'))
}
