//! Intake errors
//!
//! Caller-facing taxonomy of the pipeline. Document failures are normally
//! absorbed into the activity log; they only surface here from an explicit
//! regeneration request.

use bridge_artifact::StoreError;
use bridge_forms::{SchemaError, ValidationErrors};
use bridge_model::{LeadId, LeadStatus, ModelError};
use bridge_render::RenderError;
use bridge_store::RepositoryError;

/// Pipeline error
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    /// Form data fails its schema; nothing was written
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// Category id is not in the catalog
    #[error("unknown product category: {0}")]
    UnknownCategory(String),

    /// No lead with this id or reference
    #[error("lead not found: {0}")]
    NotFound(String),

    /// Status change not reachable from the current status
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: LeadStatus, to: LeadStatus },

    /// Lead status does not admit a document
    #[error("no document for a {0} lead")]
    DocumentNotApplicable(LeadStatus),

    /// Reference could not be allocated; the lead was not created
    #[error("reference allocation failed: {0}")]
    AllocationFailure(#[source] RepositoryError),

    /// Durable store failure outside allocation
    #[error("repository error: {0}")]
    Repository(RepositoryError),

    /// Document rendering failed
    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    /// Artifact upload or write failed
    #[error("store failed: {0}")]
    Store(#[from] StoreError),

    /// Render or store exceeded its time budget
    #[error("{stage} timed out after {millis}ms")]
    Timeout { stage: &'static str, millis: u64 },

    /// Product catalog is unusable
    #[error("catalog error: {0}")]
    Catalog(String),

    /// Configuration is unusable
    #[error("configuration error: {0}")]
    Config(String),
}

impl IntakeError {
    /// Another attempt may succeed with the same input
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::AllocationFailure(_) | Self::Timeout { .. } => true,
            Self::Repository(e) => e.is_retryable(),
            Self::Store(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// The caller must change the request
    #[inline]
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::UnknownCategory(_)
                | Self::NotFound(_)
                | Self::InvalidTransition { .. }
                | Self::DocumentNotApplicable(_)
        )
    }

    pub(crate) fn not_found(id: LeadId) -> Self {
        Self::NotFound(id.to_string())
    }
}

impl From<RepositoryError> for IntakeError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => Self::not_found(id),
            RepositoryError::Model(ModelError::InvalidTransition { from, to }) => {
                Self::InvalidTransition { from, to }
            }
            other => Self::Repository(other),
        }
    }
}

impl From<SchemaError> for IntakeError {
    fn from(err: SchemaError) -> Self {
        Self::Catalog(err.to_string())
    }
}
