//! Document templates

use crate::error::RenderError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Template used when a category does not name one
pub const DEFAULT_TEMPLATE_ID: &str = "lead_summary";

/// Fixed-layout document template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTemplate {
    pub id: String,
    /// Heading on the first page
    pub title: String,
    /// Line under the heading
    #[serde(default)]
    pub subtitle: Option<String>,
    /// Text on every page footer, left of the page counter
    #[serde(default)]
    pub footer: String,
    /// Include the submitted form fields section
    #[serde(default = "default_true")]
    pub include_form_data: bool,
}

fn default_true() -> bool {
    true
}

impl DocumentTemplate {
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            subtitle: None,
            footer: String::new(),
            include_form_data: true,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = footer.into();
        self
    }

    /// The summary template shipped with the service
    #[must_use]
    pub fn lead_summary() -> Self {
        Self::new(DEFAULT_TEMPLATE_ID, "Lead Submission")
            .with_subtitle("Customer application summary")
            .with_footer("Generated by Bridge lead intake")
    }
}

/// Templates by id
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, DocumentTemplate>,
}

impl TemplateRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in summary template
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(DocumentTemplate::lead_summary());
        registry
    }

    /// Add or replace a template
    pub fn register(&mut self, template: DocumentTemplate) {
        self.templates.insert(template.id.clone(), template);
    }

    /// Resolve `id`
    ///
    /// # Errors
    /// Returns `RenderError::MissingTemplate` for unknown ids
    pub fn get(&self, id: &str) -> Result<&DocumentTemplate, RenderError> {
        self.templates
            .get(id)
            .ok_or_else(|| RenderError::MissingTemplate(id.to_string()))
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.templates.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }
}
