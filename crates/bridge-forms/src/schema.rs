//! Form schema description
//!
//! A schema is a floor: it lists the fields a product requires and the
//! constraints on them. Fields not listed are passed through untouched.
//! The JSON/TOML shape follows the form builder's `{"fields": [...]}` layout.

use crate::error::SchemaError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Input widget / value kind of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    #[default]
    Text,
    Textarea,
    Email,
    Phone,
    Number,
    /// ISO `YYYY-MM-DD`
    Date,
    Radio,
    Dropdown,
    Checkbox,
}

impl FieldKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Textarea => "textarea",
            FieldKind::Email => "email",
            FieldKind::Phone => "phone",
            FieldKind::Number => "number",
            FieldKind::Date => "date",
            FieldKind::Radio => "radio",
            FieldKind::Dropdown => "dropdown",
            FieldKind::Checkbox => "checkbox",
        }
    }

    /// Value must be one of the declared options
    #[inline]
    #[must_use]
    pub const fn is_choice(self) -> bool {
        matches!(self, FieldKind::Radio | FieldKind::Dropdown)
    }

    /// Value is free text
    #[inline]
    #[must_use]
    pub const fn is_textual(self) -> bool {
        matches!(
            self,
            FieldKind::Text | FieldKind::Textarea | FieldKind::Email | FieldKind::Phone
        )
    }
}

/// One selectable option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub value: String,
    #[serde(default)]
    pub label: String,
}

impl ChoiceOption {
    #[must_use]
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Typed constraints on a field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldRules {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Numeric lower bound (inclusive)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Numeric upper bound (inclusive)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Regular expression the whole text value must match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Minimum age in whole years, for date-of-birth fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_age: Option<u32>,
    /// Maximum age in whole years, for date-of-birth fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age: Option<u32>,
}

/// A field declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Dotted path into the form data (`nominee.name`)
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ChoiceOption>,
    #[serde(default, rename = "validation", skip_serializing_if = "is_default_rules")]
    pub rules: FieldRules,
}

fn is_default_rules(rules: &FieldRules) -> bool {
    *rules == FieldRules::default()
}

impl FieldSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind,
            required: false,
            options: Vec::new(),
            rules: FieldRules::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_options<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = values
            .into_iter()
            .map(|v| {
                let v = v.into();
                ChoiceOption::new(v.clone(), v)
            })
            .collect();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.rules.min_length = min;
        self.rules.max_length = max;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.rules.min = min;
        self.rules.max = max;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.rules.pattern = Some(pattern.into());
        self
    }

    /// Age bounds (inclusive, whole years) for a date-of-birth field
    #[inline]
    #[must_use]
    pub fn with_age_range(mut self, min_age: u32, max_age: u32) -> Self {
        self.rules.min_age = Some(min_age);
        self.rules.max_age = Some(max_age);
        self
    }

    /// Display name for messages
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.name
        } else {
            &self.label
        }
    }

    fn check(&self) -> Result<Option<Regex>, SchemaError> {
        if self.name.is_empty() || self.name.split('.').any(str::is_empty) {
            return Err(SchemaError::InvalidPath(self.name.clone()));
        }

        let not_applicable = |rule| SchemaError::RuleNotApplicable {
            field: self.name.clone(),
            rule,
            kind: self.kind.as_str(),
        };
        let inverted = |rule| SchemaError::InvertedBounds {
            field: self.name.clone(),
            rule,
        };

        let r = &self.rules;
        if (r.min_age.is_some() || r.max_age.is_some()) && self.kind != FieldKind::Date {
            return Err(not_applicable("min_age/max_age"));
        }
        if (r.min.is_some() || r.max.is_some()) && self.kind != FieldKind::Number {
            return Err(not_applicable("min/max"));
        }
        if (r.min_length.is_some() || r.max_length.is_some() || r.pattern.is_some())
            && !self.kind.is_textual()
        {
            return Err(not_applicable("min_length/max_length/pattern"));
        }
        if self.kind.is_choice() && self.options.is_empty() {
            return Err(SchemaError::MissingOptions(self.name.clone()));
        }

        if matches!((r.min_length, r.max_length), (Some(lo), Some(hi)) if lo > hi) {
            return Err(inverted("min_length > max_length"));
        }
        if matches!((r.min, r.max), (Some(lo), Some(hi)) if lo > hi) {
            return Err(inverted("min > max"));
        }
        if matches!((r.min_age, r.max_age), (Some(lo), Some(hi)) if lo > hi) {
            return Err(inverted("min_age > max_age"));
        }

        r.pattern
            .as_deref()
            .map(|p| {
                Regex::new(&format!("^(?:{p})$")).map_err(|e| SchemaError::InvalidPattern {
                    field: self.name.clone(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }
}

/// Serialized schema shape
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SchemaDef {
    #[serde(default)]
    fields: Vec<FieldSpec>,
}

/// A checked form schema with its patterns compiled
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "SchemaDef", into = "SchemaDef")]
pub struct FormSchema {
    fields: Vec<FieldSpec>,
    patterns: Vec<Option<Regex>>,
}

impl FormSchema {
    /// Check field declarations and compile their patterns
    ///
    /// # Errors
    /// Returns `SchemaError` for duplicate paths, inverted bounds, rules that
    /// do not fit the field kind, or invalid patterns
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, SchemaError> {
        let mut seen = HashSet::new();
        let mut patterns = Vec::with_capacity(fields.len());
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
            patterns.push(field.check()?);
        }
        Ok(Self { fields, patterns })
    }

    /// Field declarations in order
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Look up a field by path
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Paths of required fields
    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&FieldSpec, Option<&Regex>)> {
        self.fields
            .iter()
            .zip(self.patterns.iter().map(Option::as_ref))
    }
}

impl PartialEq for FormSchema {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl TryFrom<SchemaDef> for FormSchema {
    type Error = SchemaError;

    fn try_from(def: SchemaDef) -> Result<Self, Self::Error> {
        Self::new(def.fields)
    }
}

impl From<FormSchema> for SchemaDef {
    fn from(schema: FormSchema) -> Self {
        Self {
            fields: schema.fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_form_builder_layout() {
        let schema: FormSchema = serde_json::from_value(json!({
            "fields": [
                {"name": "customer_name", "label": "Full Name", "type": "text", "required": true},
                {"name": "date_of_birth", "type": "date", "required": true,
                 "validation": {"min_age": 18, "max_age": 65}},
                {"name": "gender", "type": "radio", "required": true,
                 "options": [{"value": "male", "label": "Male"}, {"value": "female", "label": "Female"}]},
            ]
        }))
        .unwrap();

        assert_eq!(schema.fields().len(), 3);
        assert_eq!(
            schema.required_fields().collect::<Vec<_>>(),
            ["customer_name", "date_of_birth", "gender"]
        );
        let dob = schema.field("date_of_birth").unwrap();
        assert_eq!(dob.kind, FieldKind::Date);
        assert_eq!(dob.rules.min_age, Some(18));
    }

    #[test]
    fn rejects_duplicate_fields() {
        let err = FormSchema::new(vec![
            FieldSpec::new("email", "Email", FieldKind::Email),
            FieldSpec::new("email", "Email again", FieldKind::Email),
        ])
        .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateField("email".into()));
    }

    #[test]
    fn rejects_bad_patterns_and_bounds() {
        let bad_pattern = FieldSpec::new("code", "Code", FieldKind::Text).with_pattern("(");
        assert!(matches!(
            FormSchema::new(vec![bad_pattern]),
            Err(SchemaError::InvalidPattern { .. })
        ));

        let inverted = FieldSpec::new("dob", "DOB", FieldKind::Date).with_age_range(70, 18);
        assert!(matches!(
            FormSchema::new(vec![inverted]),
            Err(SchemaError::InvertedBounds { .. })
        ));
    }

    #[test]
    fn rejects_misplaced_rules() {
        let age_on_text = FieldSpec::new("age", "Age", FieldKind::Text).with_age_range(18, 65);
        assert!(matches!(
            FormSchema::new(vec![age_on_text]),
            Err(SchemaError::RuleNotApplicable { .. })
        ));
        let empty_choice = FieldSpec::new("plan", "Plan", FieldKind::Dropdown);
        assert_eq!(
            FormSchema::new(vec![empty_choice]).unwrap_err(),
            SchemaError::MissingOptions("plan".into())
        );
        assert!(matches!(
            FormSchema::new(vec![FieldSpec::new("a..b", "", FieldKind::Text)]),
            Err(SchemaError::InvalidPath(_))
        ));
    }

    #[test]
    fn serialization_keeps_declarations() {
        let schema = FormSchema::new(vec![FieldSpec::new("phone", "Phone", FieldKind::Phone)
            .required()
            .with_length(Some(10), None)])
        .unwrap();
        let text = serde_json::to_string(&schema).unwrap();
        let back: FormSchema = serde_json::from_str(&text).unwrap();
        assert_eq!(back, schema);
    }
}
