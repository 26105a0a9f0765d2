//! Form validator
//!
//! Single pass over the schema collecting every violation. The form is only
//! read; unknown fields survive untouched in [`ValidatedData`].

use crate::error::{FieldViolation, ValidationErrors, ViolationCode};
use crate::schema::{FieldKind, FieldSpec, FormSchema};
use bridge_model::{FormData, ProductCategory};
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$")
        .unwrap_or_else(|e| panic!("email pattern: {e}"))
});

/// Form data that passed validation, plus derived facts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedData {
    /// Catalog id of the category validated against
    pub category: String,
    /// The submitted form, unchanged
    pub form: FormData,
    /// Ages computed from date fields with age rules, by field path
    pub ages: Vec<(String, u32)>,
}

impl ValidatedData {
    /// Take back the form data
    #[inline]
    #[must_use]
    pub fn into_form(self) -> FormData {
        self.form
    }
}

/// Validate `form` against `schema`.
///
/// `submission_date` anchors age and future-date checks.
///
/// # Errors
/// Returns every violation found, tagged with its field path
pub fn validate(
    category: &ProductCategory,
    form: &FormData,
    schema: &FormSchema,
    submission_date: NaiveDate,
) -> Result<ValidatedData, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let mut ages = Vec::new();

    for (spec, pattern) in schema.entries() {
        let value = lookup(form, &spec.name);
        if is_blank(value) {
            if spec.required {
                errors.push(FieldViolation::new(
                    &spec.name,
                    ViolationCode::Required,
                    format!("{} is required", spec.display_name()),
                ));
            }
            continue;
        }
        let Some(value) = value else { continue };

        match check_value(spec, pattern, value, submission_date) {
            Ok(Some(age)) => ages.push((spec.name.clone(), age)),
            Ok(None) => {}
            Err(violations) => errors.0.extend(violations),
        }
    }

    if errors.is_empty() {
        Ok(ValidatedData {
            category: category.id.clone(),
            form: form.clone(),
            ages,
        })
    } else {
        tracing::debug!(
            category = %category.id,
            violations = errors.len(),
            "form rejected"
        );
        Err(errors)
    }
}

/// Resolve a dotted path through nested objects
fn lookup<'a>(form: &'a FormData, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = form.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

/// Check one present value; returns the computed age for date fields with age rules
fn check_value(
    spec: &FieldSpec,
    pattern: Option<&Regex>,
    value: &Value,
    today: NaiveDate,
) -> Result<Option<u32>, Vec<FieldViolation>> {
    let name = spec.display_name();
    let violation = |code, message: String| FieldViolation::new(&spec.name, code, message);
    let mut found = Vec::new();
    let mut age = None;

    match spec.kind {
        kind if kind.is_textual() => {
            let Some(text) = value.as_str().map(str::trim) else {
                return Err(vec![violation(
                    ViolationCode::InvalidType,
                    format!("{name} must be text"),
                )]);
            };
            let len = text.chars().count();
            if let Some(min) = spec.rules.min_length.filter(|min| len < *min) {
                found.push(violation(
                    ViolationCode::TooShort,
                    format!("{name} must be at least {min} characters"),
                ));
            }
            if let Some(max) = spec.rules.max_length.filter(|max| len > *max) {
                found.push(violation(
                    ViolationCode::TooLong,
                    format!("{name} must be at most {max} characters"),
                ));
            }
            if kind == FieldKind::Email && !EMAIL.is_match(text) {
                found.push(violation(
                    ViolationCode::InvalidEmail,
                    format!("{name} is not a valid email address"),
                ));
            }
            if kind == FieldKind::Phone && !is_phone(text) {
                found.push(violation(
                    ViolationCode::InvalidPhone,
                    format!("{name} must contain 10 to 15 digits"),
                ));
            }
            if pattern.is_some_and(|re| !re.is_match(text)) {
                found.push(violation(
                    ViolationCode::PatternMismatch,
                    format!("{name} has an invalid format"),
                ));
            }
        }
        FieldKind::Number => match as_number(value) {
            None => found.push(violation(
                ViolationCode::InvalidType,
                format!("{name} must be a number"),
            )),
            Some(n) => {
                if let Some(min) = spec.rules.min.filter(|min| n < *min) {
                    found.push(violation(
                        ViolationCode::BelowMinimum,
                        format!("{name} must be at least {min}"),
                    ));
                }
                if let Some(max) = spec.rules.max.filter(|max| n > *max) {
                    found.push(violation(
                        ViolationCode::AboveMaximum,
                        format!("{name} must be at most {max}"),
                    ));
                }
            }
        },
        FieldKind::Date => {
            let parsed = value
                .as_str()
                .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok());
            let (min_age, max_age) = (spec.rules.min_age, spec.rules.max_age);
            let birth_date = min_age.is_some() || max_age.is_some();
            match parsed {
                None => found.push(violation(
                    ViolationCode::InvalidDate,
                    format!("{name} must be a date in YYYY-MM-DD format"),
                )),
                // only birth dates are bounded by today; expiry dates may lie ahead
                Some(date) if birth_date && date > today => found.push(violation(
                    ViolationCode::FutureDate,
                    format!("{name} cannot be in the future"),
                )),
                Some(date) => {
                    if birth_date {
                        let years = age_in_years(date, today);
                        let lo = min_age.unwrap_or(0);
                        let hi = max_age.unwrap_or(u32::MAX);
                        if (lo..=hi).contains(&years) {
                            age = Some(years);
                        } else {
                            found.push(violation(
                                ViolationCode::AgeOutOfRange,
                                age_message(name, min_age, max_age, years),
                            ));
                        }
                    }
                }
            }
        }
        FieldKind::Radio | FieldKind::Dropdown => {
            let chosen = match value {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            };
            if !chosen.is_some_and(|c| spec.options.iter().any(|o| o.value == c)) {
                found.push(violation(
                    ViolationCode::InvalidChoice,
                    format!("{name} must be one of the listed options"),
                ));
            }
        }
        FieldKind::Checkbox => {
            let ok = match value {
                Value::Bool(_) => true,
                Value::Array(items) if !spec.options.is_empty() => items.iter().all(|item| {
                    item.as_str()
                        .is_some_and(|s| spec.options.iter().any(|o| o.value == s))
                }),
                Value::Array(_) => true,
                _ => false,
            };
            if !ok {
                found.push(violation(
                    ViolationCode::InvalidChoice,
                    format!("{name} has an invalid selection"),
                ));
            }
        }
        // textual kinds are handled by the guard arm above
        _ => {}
    }

    if found.is_empty() {
        Ok(age)
    } else {
        Err(found)
    }
}

/// Numbers arrive either as JSON numbers or as numeric strings
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn is_phone(text: &str) -> bool {
    let allowed = text
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'));
    let digits = text.chars().filter(char::is_ascii_digit).count();
    allowed && (10..=15).contains(&digits)
}

/// Whole years between `born` and `on`
#[must_use]
pub fn age_in_years(born: NaiveDate, on: NaiveDate) -> u32 {
    if on < born {
        return 0;
    }
    let mut years = on.year() - born.year();
    if (on.month(), on.day()) < (born.month(), born.day()) {
        years -= 1;
    }
    u32::try_from(years).unwrap_or(0)
}

fn age_message(name: &str, min: Option<u32>, max: Option<u32>, actual: u32) -> String {
    match (min, max) {
        (Some(lo), Some(hi)) => format!("{name}: age must be between {lo} and {hi} (got {actual})"),
        (Some(lo), None) => format!("{name}: age must be at least {lo} (got {actual})"),
        (None, Some(hi)) => format!("{name}: age must be at most {hi} (got {actual})"),
        (None, None) => format!("{name}: age out of range (got {actual})"),
    }
}
