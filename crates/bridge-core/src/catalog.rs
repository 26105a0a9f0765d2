//! Product catalog
//!
//! Supplies, per category, the reference prefix, the document template and
//! the form schema. The pipeline reads it through [`ProductCatalog`]; the
//! field lists live in catalog data, never in pipeline code.

use crate::error::IntakeError;
use bridge_forms::{FieldKind, FieldSpec, FormSchema};
use bridge_model::{CategoryPrefix, ProductCategory};
use bridge_render::{RenderContext, DEFAULT_TEMPLATE_ID};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// One catalog category with everything the pipeline needs for it
#[derive(Debug, Clone)]
pub struct CategorySpec {
    pub category: ProductCategory,
    pub template_id: String,
    pub schema: FormSchema,
}

impl CategorySpec {
    #[must_use]
    pub fn new(category: ProductCategory, schema: FormSchema) -> Self {
        Self {
            category,
            template_id: DEFAULT_TEMPLATE_ID.to_string(),
            schema,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_template(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = template_id.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.category.id
    }

    /// Renderer inputs: template plus schema labels by field path
    #[must_use]
    pub fn render_context(&self) -> RenderContext {
        let labels: BTreeMap<String, String> = self
            .schema
            .fields()
            .iter()
            .filter(|f| !f.label.is_empty())
            .map(|f| (f.name.clone(), f.label.clone()))
            .collect();
        RenderContext::new(self.template_id.clone()).with_labels(labels)
    }
}

/// Read access to product categories
pub trait ProductCatalog: Send + Sync {
    fn get(&self, category_id: &str) -> Option<&CategorySpec>;

    /// All categories in catalog order
    fn categories(&self) -> Vec<&CategorySpec>;
}

/// Immutable in-memory catalog
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    entries: Vec<CategorySpec>,
    by_id: HashMap<String, usize>,
}

impl StaticCatalog {
    /// Build from `entries`, rejecting duplicate ids or prefixes
    ///
    /// # Errors
    /// Returns `Catalog` when two categories share an id or a prefix
    pub fn new(entries: Vec<CategorySpec>) -> Result<Self, IntakeError> {
        let mut by_id = HashMap::with_capacity(entries.len());
        let mut prefixes: HashMap<CategoryPrefix, &str> = HashMap::new();
        for (i, spec) in entries.iter().enumerate() {
            if by_id.insert(spec.id().to_string(), i).is_some() {
                return Err(IntakeError::Catalog(format!("duplicate category id {}", spec.id())));
            }
            if let Some(other) = prefixes.insert(spec.category.prefix, spec.id()) {
                return Err(IntakeError::Catalog(format!(
                    "prefix {} used by both {other} and {}",
                    spec.category.prefix,
                    spec.id()
                )));
            }
        }
        Ok(Self { entries, by_id })
    }

    /// Life, health, car and motor insurance with their application forms
    ///
    /// # Errors
    /// Only fails if the built-in definitions are inconsistent
    pub fn builtin() -> Result<Self, IntakeError> {
        Self::new(vec![
            life_insurance()?,
            health_insurance()?,
            car_insurance()?,
            motor_insurance()?,
        ])
    }

    /// Parse a TOML catalog (`[[categories]]` tables)
    ///
    /// # Errors
    /// Returns `Catalog` for malformed documents or schemas
    pub fn from_toml_str(text: &str) -> Result<Self, IntakeError> {
        let doc: CatalogDoc = toml::from_str(text).map_err(|e| IntakeError::Catalog(e.to_string()))?;
        doc.build()
    }

    /// Parse a YAML catalog with the same shape as the TOML one
    ///
    /// # Errors
    /// Returns `Catalog` for malformed documents or schemas
    pub fn from_yaml_str(text: &str) -> Result<Self, IntakeError> {
        let doc: CatalogDoc =
            serde_yaml::from_str(text).map_err(|e| IntakeError::Catalog(e.to_string()))?;
        doc.build()
    }

    /// Load by extension: `.yaml`/`.yml` as YAML, anything else as TOML
    ///
    /// # Errors
    /// Returns `Catalog` when the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, IntakeError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| IntakeError::Catalog(format!("{}: {e}", path.display())))?;
        let yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
        let catalog = if yaml {
            Self::from_yaml_str(&text)?
        } else {
            Self::from_toml_str(&text)?
        };
        tracing::info!(path = %path.display(), categories = catalog.len(), "catalog loaded");
        Ok(catalog)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ProductCatalog for StaticCatalog {
    fn get(&self, category_id: &str) -> Option<&CategorySpec> {
        self.by_id.get(category_id).map(|&i| &self.entries[i])
    }

    fn categories(&self) -> Vec<&CategorySpec> {
        self.entries.iter().collect()
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogDoc {
    #[serde(default)]
    categories: Vec<CategoryDoc>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CategoryDoc {
    id: String,
    name: String,
    #[serde(default)]
    prefix: Option<String>,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    template: Option<String>,
    #[serde(default)]
    fields: Vec<FieldSpec>,
}

impl CatalogDoc {
    fn build(self) -> Result<StaticCatalog, IntakeError> {
        let entries = self
            .categories
            .into_iter()
            .map(|doc| {
                let context = |e: &dyn std::fmt::Display| {
                    IntakeError::Catalog(format!("category {}: {e}", doc.id))
                };
                let mut category =
                    ProductCategory::new(doc.id.clone(), doc.name.clone()).map_err(|e| context(&e))?;
                if let Some(prefix) = &doc.prefix {
                    category = category.with_prefix(CategoryPrefix::new(prefix).map_err(|e| context(&e))?);
                }
                if let Some(slug) = &doc.slug {
                    category = category.with_slug(slug.clone());
                }
                let schema = FormSchema::new(doc.fields).map_err(|e| context(&e))?;
                let mut spec = CategorySpec::new(category, schema);
                if let Some(template) = doc.template {
                    spec = spec.with_template(template);
                }
                Ok(spec)
            })
            .collect::<Result<Vec<_>, IntakeError>>()?;
        StaticCatalog::new(entries)
    }
}

fn contact_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("customer_name", "Full Name", FieldKind::Text)
            .required()
            .with_length(Some(2), Some(120)),
        FieldSpec::new("email", "Email Address", FieldKind::Email).required(),
        FieldSpec::new("phone", "Mobile Number", FieldKind::Phone).required(),
    ]
}

fn category(id: &str, name: &str, fields: Vec<FieldSpec>) -> Result<CategorySpec, IntakeError> {
    let category =
        ProductCategory::new(id, name).map_err(|e| IntakeError::Catalog(e.to_string()))?;
    Ok(CategorySpec::new(category, FormSchema::new(fields)?))
}

fn life_insurance() -> Result<CategorySpec, IntakeError> {
    let mut fields = contact_fields();
    fields.extend([
        FieldSpec::new("date_of_birth", "Date of Birth", FieldKind::Date)
            .required()
            .with_age_range(18, 65),
        FieldSpec::new("gender", "Gender", FieldKind::Radio)
            .required()
            .with_options(["male", "female", "other"]),
        FieldSpec::new("coverage_amount", "Coverage Amount", FieldKind::Number)
            .required()
            .with_range(Some(100_000.0), None),
        FieldSpec::new("policy_term", "Policy Term (Years)", FieldKind::Number)
            .required()
            .with_range(Some(5.0), Some(40.0)),
        FieldSpec::new("nominee_name", "Nominee Name", FieldKind::Text).required(),
        FieldSpec::new("nominee_relationship", "Relationship with Nominee", FieldKind::Dropdown)
            .required()
            .with_options(["spouse", "parent", "child", "sibling", "other"]),
        FieldSpec::new("annual_income", "Annual Income", FieldKind::Number)
            .required()
            .with_range(Some(0.0), None),
    ]);
    category("life-insurance", "Life Insurance", fields)
}

fn health_insurance() -> Result<CategorySpec, IntakeError> {
    let mut fields = contact_fields();
    fields.extend([
        FieldSpec::new("age", "Age", FieldKind::Number)
            .required()
            .with_range(Some(0.0), Some(99.0)),
        FieldSpec::new("coverage_type", "Coverage Type", FieldKind::Radio)
            .required()
            .with_options(["individual", "family_floater", "senior_citizen"]),
        FieldSpec::new("sum_insured", "Sum Insured", FieldKind::Dropdown)
            .required()
            .with_options(["300000", "500000", "1000000", "2000000", "5000000"]),
        FieldSpec::new(
            "pre_existing_conditions",
            "Any Pre-existing Medical Conditions?",
            FieldKind::Textarea,
        )
        .with_length(None, Some(2_000)),
        FieldSpec::new("number_of_members", "Number of Family Members to Cover", FieldKind::Number)
            .required()
            .with_range(Some(1.0), Some(12.0)),
    ]);
    category("health-insurance", "Health Insurance", fields)
}

fn vehicle_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("vehicle_number", "Vehicle Registration Number", FieldKind::Text)
            .required()
            .with_pattern("[A-Za-z]{2}[ -]?[0-9]{1,2}[ -]?[A-Za-z]{0,3}[ -]?[0-9]{1,4}"),
        FieldSpec::new("vehicle_make", "Vehicle Make", FieldKind::Text).required(),
        FieldSpec::new("vehicle_model", "Vehicle Model", FieldKind::Text).required(),
        FieldSpec::new("manufacturing_year", "Year of Manufacture", FieldKind::Number)
            .required()
            .with_range(Some(1980.0), Some(2100.0)),
        FieldSpec::new("insurance_type", "Insurance Type", FieldKind::Radio)
            .required()
            .with_options(["comprehensive", "third_party"]),
        FieldSpec::new("previous_insurance_expiry", "Previous Insurance Expiry Date", FieldKind::Date),
    ]
}

fn car_insurance() -> Result<CategorySpec, IntakeError> {
    let mut fields = contact_fields();
    fields.extend(vehicle_fields());
    fields.push(
        FieldSpec::new("is_new_vehicle", "Is this a new vehicle (less than 1 year old)?", FieldKind::Radio)
            .required()
            .with_options(["yes", "no"]),
    );
    category("car-insurance", "Car Insurance", fields)
}

fn motor_insurance() -> Result<CategorySpec, IntakeError> {
    let mut fields = contact_fields();
    fields.extend(vehicle_fields());
    category("motor-bike-insurance", "Motor/Bike Insurance", fields)
}
