//! Activity timeline entries and actor identity

use crate::error::ModelError;
use crate::ids::LeadId;
use crate::status::LeadStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Role of an authenticated caller, as asserted by the auth layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    #[default]
    Agent,
    Admin,
    /// Background work performed by the service itself
    System,
}

impl ActorRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ActorRole::Agent => "agent",
            ActorRole::Admin => "admin",
            ActorRole::System => "system",
        }
    }
}

impl FromStr for ActorRole {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agent" => Ok(ActorRole::Agent),
            "admin" => Ok(ActorRole::Admin),
            "system" => Ok(ActorRole::System),
            other => Err(ModelError::UnknownRole(other.to_string())),
        }
    }
}

/// Who performed an action
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: ActorRole,
}

impl Actor {
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, role: ActorRole) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    /// The service itself (retry worker, migrations)
    #[inline]
    #[must_use]
    pub fn system() -> Self {
        Self::new("system", ActorRole::System)
    }
}

impl Display for ActorRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Display for Actor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role.as_str(), self.id)
    }
}

/// Activity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Created,
    StatusChange,
    NoteAdded,
    DocumentGenerated,
    DocumentFailed,
}

impl ActivityKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ActivityKind::Created => "created",
            ActivityKind::StatusChange => "status_change",
            ActivityKind::NoteAdded => "note_added",
            ActivityKind::DocumentGenerated => "document_generated",
            ActivityKind::DocumentFailed => "document_failed",
        }
    }
}

impl FromStr for ActivityKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(ActivityKind::Created),
            "status_change" => Ok(ActivityKind::StatusChange),
            "note_added" => Ok(ActivityKind::NoteAdded),
            "document_generated" => Ok(ActivityKind::DocumentGenerated),
            "document_failed" => Ok(ActivityKind::DocumentFailed),
            other => Err(ModelError::UnknownActivityKind(other.to_string())),
        }
    }
}

/// Append-only timeline entry for a lead
///
/// `seq` is assigned by the store on append (0 before that) and orders
/// entries of one lead by creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub seq: i64,
    pub lead_id: LeadId,
    pub kind: ActivityKind,
    pub actor: Actor,
    pub description: String,
    /// Free-form JSON object (old/new status, artifact key, error text...)
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    /// Hash of the previous entry of the same lead (`None` for the first)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_hash: Option<String>,
    /// Chain hash assigned by the store on append
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl ActivityRecord {
    /// Unsequenced record stamped now
    #[must_use]
    pub fn new(
        lead_id: LeadId,
        kind: ActivityKind,
        actor: Actor,
        description: impl Into<String>,
        metadata: Value,
    ) -> Self {
        Self {
            seq: 0,
            lead_id,
            kind,
            actor,
            description: description.into(),
            metadata,
            created_at: Utc::now(),
            prev_hash: None,
            hash: None,
        }
    }

    /// Lead creation event
    #[must_use]
    pub fn created(lead_id: LeadId, actor: Actor, reference: &str, status: LeadStatus) -> Self {
        let description = format!("Lead {reference} created by {actor}");
        Self::new(
            lead_id,
            ActivityKind::Created,
            actor,
            description,
            json!({ "reference_number": reference, "status": status.as_str() }),
        )
    }

    /// Status change event
    #[must_use]
    pub fn status_change(
        lead_id: LeadId,
        actor: Actor,
        from: LeadStatus,
        to: LeadStatus,
        note: Option<&str>,
    ) -> Self {
        let mut description = format!("Status changed from {from} to {to}");
        if let Some(note) = note.filter(|n| !n.trim().is_empty()) {
            description.push_str(": ");
            description.push_str(note.trim());
        }
        Self::new(
            lead_id,
            ActivityKind::StatusChange,
            actor,
            description,
            json!({ "old_status": from.as_str(), "new_status": to.as_str() }),
        )
    }

    /// Free-text note
    #[must_use]
    pub fn note(lead_id: LeadId, actor: Actor, text: &str) -> Self {
        Self::new(
            lead_id,
            ActivityKind::NoteAdded,
            actor,
            text.trim(),
            json!({}),
        )
    }

    /// Document rendered and stored
    #[must_use]
    pub fn document_generated(lead_id: LeadId, key: &str, location: &str, checksum: &str) -> Self {
        Self::new(
            lead_id,
            ActivityKind::DocumentGenerated,
            Actor::system(),
            format!("Document stored at {location}"),
            json!({ "key": key, "location": location, "checksum": checksum }),
        )
    }

    /// Document stage failed; `stage` is `render` or `store`
    #[must_use]
    pub fn document_failed(lead_id: LeadId, stage: &str, error: &str, attempt: u32) -> Self {
        Self::new(
            lead_id,
            ActivityKind::DocumentFailed,
            Actor::system(),
            format!("Document {stage} failed: {error}"),
            json!({ "stage": stage, "error": error, "attempt": attempt }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_change_records_old_and_new() {
        let rec = ActivityRecord::status_change(
            LeadId::new(),
            Actor::new("admin-1", ActorRole::Admin),
            LeadStatus::Approved,
            LeadStatus::Converted,
            Some(" policy issued "),
        );
        assert_eq!(rec.kind, ActivityKind::StatusChange);
        assert_eq!(rec.metadata["old_status"], "approved");
        assert_eq!(rec.metadata["new_status"], "converted");
        assert!(rec.description.ends_with(": policy issued"));
        assert_eq!(rec.seq, 0);
        assert!(rec.hash.is_none());
    }

    #[test]
    fn document_failed_is_system_authored() {
        let rec = ActivityRecord::document_failed(LeadId::new(), "render", "missing template", 2);
        assert_eq!(rec.actor.role, ActorRole::System);
        assert_eq!(rec.metadata["stage"], "render");
        assert_eq!(rec.metadata["attempt"], 2);
    }

    #[test]
    fn unknown_role_is_reported() {
        assert_eq!("admin".parse::<ActorRole>().unwrap(), ActorRole::Admin);
        assert_eq!(
            "root".parse::<ActorRole>(),
            Err(ModelError::UnknownRole("root".into()))
        );
    }

    #[test]
    fn kind_names_roundtrip() {
        for kind in [
            ActivityKind::Created,
            ActivityKind::StatusChange,
            ActivityKind::NoteAdded,
            ActivityKind::DocumentGenerated,
            ActivityKind::DocumentFailed,
        ] {
            assert_eq!(kind.as_str().parse::<ActivityKind>().unwrap(), kind);
        }
    }
}
