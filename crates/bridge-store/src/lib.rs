//! Bridge durable store
//!
//! SQLite persistence for leads, per-prefix reference counters and the
//! append-only, hash-chained activity log.
//!
//! # Core Concepts
//!
//! - [`ReferenceAllocator`]: atomic increment-and-read of the `(prefix, year)` counter
//! - [`LeadRepository`]: lead rows, status compare-and-set, activity appends
//! - [`SqliteLeadStore`]: both traits over one pooled SQLite file in WAL mode
//! - [`ChainReport`]: result of re-walking a lead's activity hash chain
//!
//! # Example
//!
//! ```rust,no_run
//! use bridge_model::{Actor, NewLead, ProductCategory};
//! use bridge_store::{DatabaseConfig, LeadRepository, SqliteLeadStore};
//!
//! # async fn demo() -> bridge_store::Result<()> {
//! let store = SqliteLeadStore::open(&DatabaseConfig::at("data/bridge.sqlite3"))?;
//! let category = ProductCategory::new("health-insurance", "Health Insurance")?;
//! let (lead, _created) = store
//!     .create_with_reference(NewLead::submitted(category, Default::default(), Actor::system()))
//!     .await?;
//! assert!(lead.reference_number.to_string().starts_with("HI-"));
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod allocator;
mod chain;
mod error;
mod migrations;
mod pool;
mod repository;
mod rows;
mod sqlite;

pub use chain::ChainReport;
pub use error::{RepositoryError, Result};
pub use migrations::{migrate_to_latest, SCHEMA_VERSION};
pub use pool::{open_pool, DatabaseConfig, SqlitePool};
pub use repository::{LeadFilter, LeadRepository, LeadStats, ReferenceAllocator};
pub use sqlite::{SqliteLeadStore, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
