//! Bridge document rendering
//!
//! Converts a lead with an assigned reference number into a fixed-layout
//! PDF. Rendering is a pure function of the lead and its template, so a
//! retried render produces the same bytes and overwrites the same artifact.
//!
//! # Core Concepts
//!
//! - [`DocumentRenderer`]: rendering seam used by the orchestrator
//! - [`PdfRenderer`]: A4 layout with standard fonts, paginated
//! - [`TemplateRegistry`]: templates by id; unknown ids fail the render
//!
//! # Example
//!
//! ```rust
//! use bridge_model::{Actor, CategoryPrefix, FormData, NewLead, ProductCategory, ReferenceNumber};
//! use bridge_render::{DocumentRenderer, PdfRenderer, RenderContext};
//!
//! let category = ProductCategory::new("health-insurance", "Health Insurance").unwrap();
//! let lead = NewLead::submitted(category, FormData::new(), Actor::system())
//!     .into_lead(ReferenceNumber::new(CategoryPrefix::new("HI").unwrap(), 2025, 1));
//!
//! let pdf = PdfRenderer::default().render(&lead, &RenderContext::default()).unwrap();
//! assert!(pdf.starts_with(b"%PDF"));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod layout;
mod pdf;
mod template;

pub use error::RenderError;
pub use pdf::{DocumentRenderer, PdfRenderer, RenderContext};
pub use template::{DocumentTemplate, TemplateRegistry, DEFAULT_TEMPLATE_ID};
