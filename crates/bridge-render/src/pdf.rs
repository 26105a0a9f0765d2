//! PDF renderer
//!
//! Builds the document object graph by hand with `lopdf`: standard Courier
//! fonts, one content stream per page, no timestamps or random ids, so the
//! output bytes depend only on the lead and the template.

use crate::error::RenderError;
use crate::layout::{self, Line, LEADING, MARGIN, PAGE_HEIGHT, PAGE_WIDTH};
use crate::template::{TemplateRegistry, DEFAULT_TEMPLATE_ID};
use bridge_model::Lead;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::collections::BTreeMap;

/// Per-category rendering inputs supplied by the product catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderContext {
    pub template_id: String,
    /// Display labels by field path, from the form schema
    pub labels: BTreeMap<String, String>,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE_ID)
    }
}

impl RenderContext {
    #[must_use]
    pub fn new(template_id: impl Into<String>) -> Self {
        Self {
            template_id: template_id.into(),
            labels: BTreeMap::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }
}

/// Turns a lead with an assigned reference into document bytes.
///
/// Implementations must be deterministic: the same lead and context yield
/// the same bytes, so a retried render can replace a previous upload.
pub trait DocumentRenderer: Send + Sync {
    /// Render `lead`
    ///
    /// # Errors
    /// Returns `RenderError` for missing templates or unrenderable data
    fn render(&self, lead: &Lead, ctx: &RenderContext) -> Result<Vec<u8>, RenderError>;
}

/// Fixed-layout A4 PDF renderer
#[derive(Debug, Clone)]
pub struct PdfRenderer {
    templates: TemplateRegistry,
    compress: bool,
}

impl Default for PdfRenderer {
    fn default() -> Self {
        Self::new(TemplateRegistry::with_defaults())
    }
}

impl PdfRenderer {
    #[must_use]
    pub fn new(templates: TemplateRegistry) -> Self {
        Self {
            templates,
            compress: true,
        }
    }

    /// Leave content streams uncompressed (readable when debugging)
    #[inline]
    #[must_use]
    pub fn uncompressed(mut self) -> Self {
        self.compress = false;
        self
    }

    #[inline]
    #[must_use]
    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }
}

fn int(v: i64) -> Object {
    Object::Integer(v)
}

fn page_operations(lines: &[Line], footer: &str, page_no: usize, page_count: usize) -> Vec<Operation> {
    let mut ops = Vec::with_capacity(lines.len() * 4 + 8);
    let mut y = PAGE_HEIGHT - MARGIN;
    for line in lines {
        y -= LEADING;
        if line.text.is_empty() {
            continue;
        }
        let font = if line.style.bold() { "F2" } else { "F1" };
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new("Tf", vec![font.into(), int(line.style.size())]));
        ops.push(Operation::new("Td", vec![int(MARGIN), int(y)]));
        ops.push(Operation::new(
            "Tj",
            vec![Object::string_literal(line.text.as_bytes().to_vec())],
        ));
        ops.push(Operation::new("ET", vec![]));
    }

    let footer_text = layout::sanitize(&format!("{footer}  Page {page_no} of {page_count}"));
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new("Tf", vec!["F1".into(), int(8)]));
    ops.push(Operation::new("Td", vec![int(MARGIN), int(MARGIN - LEADING)]));
    ops.push(Operation::new(
        "Tj",
        vec![Object::string_literal(footer_text.trim_start().as_bytes().to_vec())],
    ));
    ops.push(Operation::new("ET", vec![]));
    ops
}

impl DocumentRenderer for PdfRenderer {
    fn render(&self, lead: &Lead, ctx: &RenderContext) -> Result<Vec<u8>, RenderError> {
        let template = self.templates.get(&ctx.template_id)?;
        let lines = layout::layout(lead, template, &ctx.labels)?;
        let pages = layout::paginate(lines);
        let page_count = pages.len();

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let regular = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let bold = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier-Bold",
        });
        let resources = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => regular, "F2" => bold },
        });

        let mut kids: Vec<Object> = Vec::with_capacity(page_count);
        for (i, page_lines) in pages.iter().enumerate() {
            let content = Content {
                operations: page_operations(page_lines, &template.footer, i + 1, page_count),
            };
            let encoded = content
                .encode()
                .map_err(|e| RenderError::Encode(e.to_string()))?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
            let page_id: ObjectId = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = i64::try_from(page_count).unwrap_or(i64::MAX);
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources,
                "MediaBox" => vec![int(0), int(0), int(PAGE_WIDTH), int(PAGE_HEIGHT)],
            }),
        );
        let catalog = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let reference = lead.reference_number.to_string();
        let info = doc.add_object(dictionary! {
            "Title" => Object::string_literal(reference.as_bytes().to_vec()),
            "Subject" => Object::string_literal(layout::sanitize(&lead.category.name).into_bytes()),
            "Producer" => Object::string_literal(b"bridge-render".to_vec()),
        });
        doc.trailer.set("Root", catalog);
        doc.trailer.set("Info", info);
        if self.compress {
            doc.compress();
        }

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|e| RenderError::Encode(e.to_string()))?;
        tracing::debug!(
            reference = %reference,
            pages = page_count,
            size = bytes.len(),
            template = %template.id,
            "document rendered"
        );
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::DocumentTemplate;
    use bridge_model::{Actor, CategoryPrefix, FormData, NewLead, ProductCategory, ReferenceNumber};
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use serde_json::json;

    fn lead_with(form: serde_json::Value) -> Lead {
        let category = ProductCategory::new("life-insurance", "Life Insurance").unwrap();
        let form: FormData = form.as_object().cloned().unwrap();
        NewLead::submitted(category, form, Actor::system())
            .with_created_at(Utc.with_ymd_and_hms(2025, 3, 7, 10, 30, 0).unwrap())
            .into_lead(ReferenceNumber::new(CategoryPrefix::new("LI").unwrap(), 2025, 789))
    }

    fn sample() -> Lead {
        lead_with(json!({
            "customer_name": "Asha Rao",
            "email": "asha@example.com",
            "coverage_amount": 1_000_000,
            "nominee": {"name": "Ravi", "relationship": "spouse"},
        }))
    }

    fn title_of(doc: &Document) -> Vec<u8> {
        let info = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        match doc.get_object(info).unwrap().as_dict().unwrap().get(b"Title").unwrap() {
            Object::String(bytes, _) => bytes.clone(),
            other => panic!("unexpected title object {other:?}"),
        }
    }

    #[test]
    fn same_lead_renders_identical_bytes() {
        let renderer = PdfRenderer::default();
        let a = renderer.render(&sample(), &RenderContext::default()).unwrap();
        let b = renderer.render(&sample(), &RenderContext::default()).unwrap();
        assert!(a.starts_with(b"%PDF-1.5"));
        assert_eq!(a, b);
    }

    #[test]
    fn different_form_data_changes_output() {
        let renderer = PdfRenderer::default();
        let a = renderer.render(&sample(), &RenderContext::default()).unwrap();
        let other = lead_with(json!({"customer_name": "Someone Else"}));
        let b = renderer.render(&other, &RenderContext::default()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn output_parses_back_with_reference_title() {
        let bytes = PdfRenderer::default()
            .render(&sample(), &RenderContext::default())
            .unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        assert_eq!(title_of(&doc), b"LI-2025-789");
    }

    #[test]
    fn long_forms_span_multiple_pages() {
        let mut form = serde_json::Map::new();
        for i in 0..120 {
            form.insert(format!("field_{i:03}"), json!(format!("value {i}")));
        }
        let lead = lead_with(serde_json::Value::Object(form));
        let bytes = PdfRenderer::default()
            .render(&lead, &RenderContext::default())
            .unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
    }

    #[test]
    fn uncompressed_stream_contains_field_text() {
        let mut labels = BTreeMap::new();
        labels.insert("coverage_amount".to_string(), "Coverage Amount".to_string());
        let bytes = PdfRenderer::default()
            .uncompressed()
            .render(&sample(), &RenderContext::default().with_labels(labels))
            .unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("(Reference Number: LI-2025-789)"));
        assert!(text.contains("(Coverage Amount: 1000000)"));
        assert!(text.contains("(Nominee / Name: Ravi)"));
    }

    #[test]
    fn missing_template_is_reported() {
        let err = PdfRenderer::default()
            .render(&sample(), &RenderContext::new("motor_v2"))
            .unwrap_err();
        assert_eq!(err, RenderError::MissingTemplate("motor_v2".into()));
    }

    #[test]
    fn custom_templates_resolve() {
        let mut templates = TemplateRegistry::with_defaults();
        templates.register(DocumentTemplate::new("health_v1", "Health Application"));
        let renderer = PdfRenderer::new(templates);
        assert!(renderer
            .render(&sample(), &RenderContext::new("health_v1"))
            .is_ok());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_rendering_is_deterministic(
            fields in proptest::collection::btree_map("[a-z][a-z_]{0,15}", "[ -~]{0,60}", 0..40),
        ) {
            let form: serde_json::Map<String, serde_json::Value> = fields
                .into_iter()
                .map(|(k, v)| (k, serde_json::Value::String(v)))
                .collect();
            let lead = lead_with(serde_json::Value::Object(form));
            let renderer = PdfRenderer::default();
            let a = renderer.render(&lead, &RenderContext::default()).unwrap();
            let b = renderer.render(&lead.clone(), &RenderContext::default()).unwrap();
            prop_assert!(a.starts_with(b"%PDF-1.5"));
            prop_assert_eq!(a, b);
        }
    }
}
