//! Bridge domain model
//!
//! Plain data types shared by every stage of the lead intake pipeline.
//!
//! # Core Concepts
//!
//! - [`Lead`]: one customer submission with its open-shaped form data
//! - [`ReferenceNumber`]: human-readable `<PREFIX>-<YEAR>-<SEQ>` identifier
//! - [`LeadStatus`]: lifecycle state with a forward-only transition graph
//! - [`ActivityRecord`]: append-only timeline entry tied to a lead
//! - [`ProductCategory`]: category tag carrying the reference prefix and slug
//!
//! # Example
//!
//! ```rust
//! use bridge_model::{CategoryPrefix, LeadStatus, ReferenceNumber};
//!
//! let prefix = CategoryPrefix::derive("Life Insurance").unwrap();
//! let reference = ReferenceNumber::new(prefix, 2025, 789);
//! assert_eq!(reference.to_string(), "LI-2025-789");
//!
//! assert!(LeadStatus::Approved.can_transition_to(LeadStatus::Converted));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod activity;
mod category;
mod error;
mod ids;
mod lead;
mod reference;
mod status;

pub use activity::{ActivityKind, ActivityRecord, Actor, ActorRole};
pub use category::{CategoryPrefix, ProductCategory};
pub use error::ModelError;
pub use ids::LeadId;
pub use lead::{FormData, Lead, LeadSource, NewLead, QuickReference};
pub use reference::ReferenceNumber;
pub use status::{allowed_transitions, validate_transition, LeadStatus};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
