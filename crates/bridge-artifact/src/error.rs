//! Storage errors

/// Coarse classification of a storage failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum StoreErrorCode {
    /// Object does not exist
    NotFound,
    /// Bad key or configuration
    Validation,
    /// Credentials rejected or write forbidden
    Permission,
    /// Transport failure or 5xx/429 response
    Network,
    /// Local filesystem failure
    Io,
    /// Unexpected backend response
    Internal,
}

impl StoreErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Validation => "validation_error",
            Self::Permission => "permission_denied",
            Self::Network => "network_error",
            Self::Io => "io_error",
            Self::Internal => "internal_error",
        }
    }
}

/// Artifact store failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}: {message}", code.as_str())]
pub struct StoreError {
    pub code: StoreErrorCode,
    pub message: String,
}

impl StoreError {
    #[must_use]
    pub fn new(code: StoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Another attempt could succeed without operator action
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self.code, StoreErrorCode::Network | StoreErrorCode::Io)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::NotFound => StoreErrorCode::NotFound,
            std::io::ErrorKind::PermissionDenied => StoreErrorCode::Permission,
            _ => StoreErrorCode::Io,
        };
        Self::new(code, err.to_string())
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        let code = if err.is_builder() {
            StoreErrorCode::Validation
        } else {
            StoreErrorCode::Network
        };
        Self::new(code, err.to_string())
    }
}
