//! Errors raised while constructing or transitioning domain values

use crate::status::LeadStatus;

/// Domain model errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Status change not reachable from the current status
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: LeadStatus, to: LeadStatus },

    /// Unrecognised status string
    #[error("unknown status: {0}")]
    UnknownStatus(String),

    /// Unrecognised lead source tag
    #[error("unknown lead source: {0}")]
    UnknownSource(String),

    /// Category prefix is not two ASCII letters
    #[error("invalid category prefix: {0:?}")]
    InvalidPrefix(String),

    /// Reference number does not match `<PREFIX>-<YEAR>-<SEQ>`
    #[error("malformed reference number: {0:?}")]
    MalformedReference(String),

    /// Lead identifier could not be parsed
    #[error("invalid lead id: {0}")]
    InvalidLeadId(String),

    /// Unrecognised actor role string
    #[error("unknown actor role: {0}")]
    UnknownRole(String),

    /// Unrecognised activity kind string
    #[error("unknown activity kind: {0}")]
    UnknownActivityKind(String),
}
