//! Bridge intake pipeline
//!
//! Turns a submitted insurance form into a durable lead with a unique
//! reference number and, when everything downstream cooperates, a stored
//! PDF summary.
//!
//! # Core Concepts
//!
//! - [`IntakeOrchestrator`]: validate, persist, allocate, render, store, in that order
//! - [`ProductCatalog`]: category metadata, form schema and template per product
//! - [`IntakeConfig`]: database, storage backend, timeouts, retry, from TOML and env
//! - [`DocumentRetryWorker`]: background pass over leads still missing a document
//! - [`IntakeError`]: caller-facing taxonomy, split into caller errors and retriable ones
//!
//! A submission succeeds as soon as the lead is durable. Render or upload
//! failures are logged to the lead's activity history and retried later;
//! they never turn an accepted lead into an error.
//!
//! # Example
//!
//! ```rust,no_run
//! use bridge_core::{IntakeConfig, IntakeOrchestrator, IntakeRequest};
//! use bridge_model::Actor;
//! use serde_json::json;
//!
//! # async fn demo() -> Result<(), bridge_core::IntakeError> {
//! let orchestrator = IntakeOrchestrator::from_config(&IntakeConfig::load(None)?)?;
//! let form = json!({
//!     "customer_name": "Asha Rao",
//!     "email": "asha@example.com",
//!     "phone": "+919876543210",
//!     "date_of_birth": "1990-04-12",
//!     "gender": "female",
//!     "coverage_amount": 500000,
//!     "policy_term": 20,
//!     "nominee_name": "Ravi Rao",
//!     "nominee_relationship": "spouse",
//!     "annual_income": 1200000,
//! });
//! let receipt = orchestrator
//!     .submit(IntakeRequest::new("life-insurance", form.as_object().cloned().unwrap_or_default(), Actor::system()))
//!     .await?;
//! println!("{} {:?}", receipt.reference_number, receipt.document_url);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod catalog;
mod config;
mod error;
mod orchestrator;
mod worker;

pub use catalog::{CategorySpec, ProductCatalog, StaticCatalog};
pub use config::{DocumentRetryConfig, IntakeConfig, DEFAULT_BUCKET, DEFAULT_OBJECT_ENDPOINT};
pub use error::IntakeError;
pub use orchestrator::{
    DocumentOutcome, DocumentStage, IntakeOrchestrator, IntakeReceipt, IntakeRequest,
    RetrySummary,
};
pub use worker::DocumentRetryWorker;
