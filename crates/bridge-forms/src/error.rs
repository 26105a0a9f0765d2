//! Validation and schema errors

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Machine-readable violation code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCode {
    /// Required field absent, null or blank
    Required,
    /// Value has the wrong JSON type for the field kind
    InvalidType,
    InvalidEmail,
    InvalidPhone,
    /// Not an ISO `YYYY-MM-DD` date
    InvalidDate,
    /// Date lies after the submission date
    FutureDate,
    TooShort,
    TooLong,
    BelowMinimum,
    AboveMaximum,
    PatternMismatch,
    /// Value not among the declared options
    InvalidChoice,
    /// Age computed from a date field is outside `[min_age, max_age]`
    AgeOutOfRange,
}

impl ViolationCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ViolationCode::Required => "required",
            ViolationCode::InvalidType => "invalid_type",
            ViolationCode::InvalidEmail => "invalid_email",
            ViolationCode::InvalidPhone => "invalid_phone",
            ViolationCode::InvalidDate => "invalid_date",
            ViolationCode::FutureDate => "future_date",
            ViolationCode::TooShort => "too_short",
            ViolationCode::TooLong => "too_long",
            ViolationCode::BelowMinimum => "below_minimum",
            ViolationCode::AboveMaximum => "above_maximum",
            ViolationCode::PatternMismatch => "pattern_mismatch",
            ViolationCode::InvalidChoice => "invalid_choice",
            ViolationCode::AgeOutOfRange => "age_out_of_range",
        }
    }
}

/// One offending field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    /// Dotted path into the form (`nominee.name`)
    pub field: String,
    pub code: ViolationCode,
    /// Human-readable message suitable for display next to the field
    pub message: String,
}

impl FieldViolation {
    #[inline]
    #[must_use]
    pub fn new(field: impl Into<String>, code: ViolationCode, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code,
            message: message.into(),
        }
    }
}

impl Display for FieldViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.field, self.message, self.code.as_str())
    }
}

/// Every violation found in one validation pass, in schema order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(transparent)]
#[error("{} field violation(s): {}", .0.len(), summarize(.0))]
pub struct ValidationErrors(pub Vec<FieldViolation>);

fn summarize(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationErrors {
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Violations for one field path
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldViolation> {
        self.0.iter().filter(move |v| v.field == field)
    }

    /// Borrow the violations
    #[inline]
    #[must_use]
    pub fn violations(&self) -> &[FieldViolation] {
        &self.0
    }

    pub(crate) fn push(&mut self, violation: FieldViolation) {
        self.0.push(violation);
    }
}

/// Schema definition errors, raised when a catalog is loaded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Two fields share the same path
    #[error("duplicate field: {0}")]
    DuplicateField(String),

    /// Field path is empty or has empty segments
    #[error("invalid field path: {0:?}")]
    InvalidPath(String),

    /// `pattern` rule is not a valid regular expression
    #[error("invalid pattern for {field}: {reason}")]
    InvalidPattern { field: String, reason: String },

    /// A lower bound exceeds its upper bound
    #[error("inverted bounds for {field}: {rule}")]
    InvertedBounds { field: String, rule: &'static str },

    /// Rule does not apply to the field kind
    #[error("rule {rule} not applicable to {kind} field {field}")]
    RuleNotApplicable {
        field: String,
        rule: &'static str,
        kind: &'static str,
    },

    /// Choice field declared without options
    #[error("choice field {0} has no options")]
    MissingOptions(String),
}
