//! Text layout: lead to wrapped, paginated lines
//!
//! Pure and order-stable; every map is walked in sorted key order so the
//! same lead always produces the same pages.

use crate::error::RenderError;
use crate::template::DocumentTemplate;
use bridge_model::Lead;
use serde_json::Value;
use std::collections::BTreeMap;

/// Nesting deeper than this is rejected as malformed
pub(crate) const MAX_DEPTH: usize = 8;
/// Documents longer than this are rejected as malformed
pub(crate) const MAX_LINES: usize = 4_000;

pub(crate) const PAGE_WIDTH: i64 = 595;
pub(crate) const PAGE_HEIGHT: i64 = 842;
pub(crate) const MARGIN: i64 = 50;
pub(crate) const BODY_SIZE: i64 = 10;
pub(crate) const LEADING: i64 = 14;
/// Courier advance is 0.6 em
const CHARS_PER_LINE: usize = ((PAGE_WIDTH - 2 * MARGIN) * 10 / (BODY_SIZE * 6)) as usize;
/// Body lines per page between the header band and the footer
pub(crate) const LINES_PER_PAGE: usize = ((PAGE_HEIGHT - 2 * MARGIN - 3 * LEADING) / LEADING) as usize;

/// Text style of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Style {
    Title,
    Heading,
    Body,
}

impl Style {
    pub(crate) const fn size(self) -> i64 {
        match self {
            Style::Title => 16,
            Style::Heading => 12,
            Style::Body => BODY_SIZE,
        }
    }

    pub(crate) const fn bold(self) -> bool {
        !matches!(self, Style::Body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Line {
    pub(crate) style: Style,
    pub(crate) text: String,
}

impl Line {
    fn new(style: Style, text: impl Into<String>) -> Self {
        Self {
            style,
            text: text.into(),
        }
    }

    fn blank() -> Self {
        Self::new(Style::Body, "")
    }
}

/// Map text to the printable ASCII subset the standard fonts cover
pub(crate) fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            ' '..='~' => out.push(c),
            '\n' | '\r' | '\t' => out.push(' '),
            '\u{20B9}' => out.push_str("INR "),
            _ => out.push('?'),
        }
    }
    out
}

/// Hard-wrap at `width` characters, preferring spaces
fn wrap(text: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= width {
        return vec![text.to_string()];
    }
    let mut lines = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + width).min(chars.len());
        let cut = if end == chars.len() {
            end
        } else {
            chars[start..end]
                .iter()
                .rposition(|c| *c == ' ')
                .map_or(end, |p| start + p + 1)
        };
        let piece: String = chars[start..cut].iter().collect();
        lines.push(piece.trim_end().to_string());
        start = cut;
    }
    lines
}

/// Flatten a form into sorted `(dotted path, display value)` pairs
pub(crate) fn flatten(form: &serde_json::Map<String, Value>) -> Result<Vec<(String, String)>, RenderError> {
    let mut out = BTreeMap::new();
    for (key, value) in form {
        flatten_into(key.clone(), value, 1, &mut out)?;
    }
    Ok(out.into_iter().collect())
}

fn flatten_into(
    path: String,
    value: &Value,
    depth: usize,
    out: &mut BTreeMap<String, String>,
) -> Result<(), RenderError> {
    if depth > MAX_DEPTH {
        return Err(RenderError::MalformedData {
            path,
            reason: format!("nested deeper than {MAX_DEPTH} levels"),
        });
    }
    match value {
        Value::Object(map) => {
            for (key, inner) in map {
                flatten_into(format!("{path}.{key}"), inner, depth + 1, out)?;
            }
        }
        Value::Array(items) if items.iter().all(is_scalar) => {
            let joined = items.iter().map(scalar_text).collect::<Vec<_>>().join(", ");
            out.insert(path, joined);
        }
        Value::Array(items) => {
            for (i, inner) in items.iter().enumerate() {
                flatten_into(format!("{path}[{i}]"), inner, depth + 1, out)?;
            }
        }
        scalar => {
            out.insert(path, scalar_text(scalar));
        }
    }
    Ok(())
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::Bool(true) => "Yes".to_string(),
        Value::Bool(false) => "No".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Display label for a field path: configured label, else the humanized path
fn label_for(path: &str, labels: &BTreeMap<String, String>) -> String {
    if let Some(label) = labels.get(path) {
        return label.clone();
    }
    path.split('.')
        .map(|seg| {
            seg.split('_')
                .filter(|w| !w.is_empty())
                .map(|w| {
                    let mut chars = w.chars();
                    chars.next().map_or_else(String::new, |first| {
                        first.to_uppercase().chain(chars).collect()
                    })
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join(" / ")
}

fn push_field(lines: &mut Vec<Line>, label: &str, value: &str) {
    let text = sanitize(&format!("{label}: {value}"));
    for piece in wrap(&text, CHARS_PER_LINE) {
        lines.push(Line::new(Style::Body, piece));
    }
}

/// Lay out `lead` with `template`
pub(crate) fn layout(
    lead: &Lead,
    template: &DocumentTemplate,
    labels: &BTreeMap<String, String>,
) -> Result<Vec<Line>, RenderError> {
    let mut lines = vec![Line::new(Style::Title, sanitize(&template.title))];
    if let Some(subtitle) = &template.subtitle {
        lines.push(Line::new(Style::Body, sanitize(subtitle)));
    }
    lines.push(Line::blank());

    lines.push(Line::new(Style::Heading, "Lead"));
    push_field(&mut lines, "Reference Number", &lead.reference_number.to_string());
    push_field(&mut lines, "Product", &lead.category.name);
    push_field(
        &mut lines,
        "Submitted On",
        &lead.created_at.format("%Y-%m-%d %H:%M UTC").to_string(),
    );
    push_field(&mut lines, "Source", lead.source.as_str());
    if let Some(code) = &lead.referral_code {
        push_field(&mut lines, "Referral Code", code);
    }
    push_field(&mut lines, "Submitted By", &lead.created_by.id);
    lines.push(Line::blank());

    let quick = [
        ("Customer Name", &lead.quick.customer_name),
        ("Customer Email", &lead.quick.customer_email),
        ("Customer Phone", &lead.quick.customer_phone),
    ];
    if quick.iter().any(|(_, v)| v.is_some()) {
        lines.push(Line::new(Style::Heading, "Customer"));
        for (label, value) in quick {
            if let Some(value) = value {
                push_field(&mut lines, label, value);
            }
        }
        lines.push(Line::blank());
    }

    if template.include_form_data {
        lines.push(Line::new(Style::Heading, "Application Details"));
        let fields = flatten(&lead.form_data)?;
        if fields.is_empty() {
            lines.push(Line::new(Style::Body, "(no fields submitted)"));
        }
        for (path, value) in fields {
            push_field(&mut lines, &sanitize(&label_for(&path, labels)), &value);
            if lines.len() > MAX_LINES {
                return Err(RenderError::MalformedData {
                    path,
                    reason: format!("document exceeds {MAX_LINES} lines"),
                });
            }
        }
    }

    Ok(lines)
}

/// Split lines into pages of at most [`LINES_PER_PAGE`]
pub(crate) fn paginate(lines: Vec<Line>) -> Vec<Vec<Line>> {
    let mut pages: Vec<Vec<Line>> = lines
        .chunks(LINES_PER_PAGE)
        .map(<[Line]>::to_vec)
        .collect();
    if pages.is_empty() {
        pages.push(Vec::new());
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn flatten_sorts_and_dots_paths() {
        let form = json!({
            "zeta": 1,
            "nominee": {"name": "Ravi", "relationship": "spouse"},
            "members": ["self", "spouse"],
            "vehicles": [{"make": "Tata"}],
            "smoker": false,
        });
        let flat = flatten(form.as_object().unwrap()).unwrap();
        assert_eq!(
            flat,
            vec![
                ("members".to_string(), "self, spouse".to_string()),
                ("nominee.name".to_string(), "Ravi".to_string()),
                ("nominee.relationship".to_string(), "spouse".to_string()),
                ("smoker".to_string(), "No".to_string()),
                ("vehicles[0].make".to_string(), "Tata".to_string()),
                ("zeta".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn flatten_rejects_deep_nesting() {
        let mut value = json!("leaf");
        for _ in 0..MAX_DEPTH {
            value = json!({ "x": value });
        }
        let form = json!({ "root": value });
        assert!(matches!(
            flatten(form.as_object().unwrap()),
            Err(RenderError::MalformedData { .. })
        ));
    }

    #[test]
    fn labels_fall_back_to_humanized_paths() {
        let mut labels = BTreeMap::new();
        labels.insert("dob".to_string(), "Date of Birth".to_string());
        assert_eq!(label_for("dob", &labels), "Date of Birth");
        assert_eq!(label_for("nominee.full_name", &labels), "Nominee / Full Name");
    }

    #[test]
    fn sanitize_keeps_ascii_only() {
        assert_eq!(sanitize("\u{20B9}5,00,000"), "INR 5,00,000");
        assert_eq!(sanitize("caf\u{e9}\nbar"), "caf? bar");
    }

    #[test]
    fn wrap_breaks_on_spaces_within_width() {
        let text = "alpha beta gamma delta epsilon";
        let lines = wrap(text, 12);
        assert!(lines.iter().all(|l| l.chars().count() <= 12), "{lines:?}");
        assert_eq!(lines.join(" "), text);
        assert_eq!(wrap(&"x".repeat(25), 10).len(), 3);
    }

    #[test]
    fn paginate_fills_pages() {
        let lines = vec![Line::blank(); LINES_PER_PAGE * 2 + 1];
        let pages = paginate(lines);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[2].len(), 1);
        assert_eq!(paginate(Vec::new()).len(), 1);
    }
}
