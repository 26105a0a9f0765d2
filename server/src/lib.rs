//! Bridge intake service
//!
//! HTTP API over [`bridge_core::IntakeOrchestrator`] plus the operator CLI.
//!
//! # Core Concepts
//!
//! - [`routes`]: warp filter tree for `/api/leads` and `/health`
//! - [`ApiError`]: maps intake errors to status codes and JSON bodies
//! - [`cli`]: `serve`, `submit`, `show`, `transition`, `retry-documents`, `catalog`, `verify`
//! - [`init_tracing`]: `EnvFilter` plus text or JSON output

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod api;
pub mod cli;
mod error;
mod telemetry;

pub use api::{actor_from_headers, routes, AddNote, ChangeStatus, CreateLead, ListQuery, StatsQuery};
pub use error::{handle_rejection, ApiError, ErrorBody};
pub use telemetry::{init_tracing, LogFormat};
