//! Bridge form validation
//!
//! Validates open-shaped lead form data against a per-product schema
//! supplied by the product catalog.
//!
//! # Core Concepts
//!
//! - [`FormSchema`]: checked list of [`FieldSpec`] declarations
//! - [`validate`]: one pass, every violation reported with its field path
//! - [`ValidationErrors`]: the caller-fixable failure list
//!
//! # Example
//!
//! ```rust
//! use bridge_forms::{validate, FieldKind, FieldSpec, FormSchema};
//! use bridge_model::ProductCategory;
//! use chrono::NaiveDate;
//! use serde_json::json;
//!
//! let schema = FormSchema::new(vec![
//!     FieldSpec::new("customer_name", "Full Name", FieldKind::Text).required(),
//!     FieldSpec::new("date_of_birth", "Date of Birth", FieldKind::Date)
//!         .required()
//!         .with_age_range(18, 65),
//! ])
//! .unwrap();
//!
//! let category = ProductCategory::new("life-insurance", "Life Insurance").unwrap();
//! let form = json!({"customer_name": "Asha", "date_of_birth": "1990-04-02"});
//! let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
//!
//! let checked = validate(&category, form.as_object().unwrap(), &schema, today).unwrap();
//! assert_eq!(checked.ages, vec![("date_of_birth".to_string(), 35)]);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod schema;
mod validate;

pub use error::{FieldViolation, SchemaError, ValidationErrors, ViolationCode};
pub use schema::{ChoiceOption, FieldKind, FieldRules, FieldSpec, FormSchema};
pub use validate::{age_in_years, validate, ValidatedData};
