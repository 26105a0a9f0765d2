//! Rendering errors

/// Document rendering failure
///
/// Never fatal to the lead itself; the orchestrator records it and leaves
/// the lead without a document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// No template registered under the category's template id
    #[error("missing template: {0}")]
    MissingTemplate(String),

    /// Form data cannot be laid out (too deep, too large)
    #[error("malformed form data at {path}: {reason}")]
    MalformedData { path: String, reason: String },

    /// PDF serialization failed
    #[error("pdf encoding failed: {0}")]
    Encode(String),
}
