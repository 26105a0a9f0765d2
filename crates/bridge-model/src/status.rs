//! Lead lifecycle states and the forward-only transition graph

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Lead status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    /// Saved but not yet submitted
    Draft,
    /// Submitted and awaiting processing
    Submitted,
    /// Picked up by a back-office user
    InProgress,
    /// Accepted
    Approved,
    /// Declined (terminal)
    Rejected,
    /// Turned into a policy (terminal)
    Converted,
}

impl LeadStatus {
    /// Every status, in lifecycle order
    pub const ALL: [LeadStatus; 6] = [
        LeadStatus::Draft,
        LeadStatus::Submitted,
        LeadStatus::InProgress,
        LeadStatus::Approved,
        LeadStatus::Rejected,
        LeadStatus::Converted,
    ];

    /// Wire/storage name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            LeadStatus::Draft => "draft",
            LeadStatus::Submitted => "submitted",
            LeadStatus::InProgress => "in_progress",
            LeadStatus::Approved => "approved",
            LeadStatus::Rejected => "rejected",
            LeadStatus::Converted => "converted",
        }
    }

    /// No transitions leave this status
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        allowed_transitions(self).is_empty()
    }

    /// Check whether `next` is directly reachable
    #[inline]
    #[must_use]
    pub fn can_transition_to(self, next: LeadStatus) -> bool {
        allowed_transitions(self).contains(&next)
    }
}

impl Display for LeadStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LeadStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ModelError::UnknownStatus(s.to_string()))
    }
}

/// Directly reachable statuses from `from`
#[must_use]
pub fn allowed_transitions(from: LeadStatus) -> &'static [LeadStatus] {
    match from {
        LeadStatus::Draft => &[LeadStatus::Submitted],
        LeadStatus::Submitted => &[LeadStatus::InProgress],
        LeadStatus::InProgress => &[LeadStatus::Approved, LeadStatus::Rejected],
        LeadStatus::Approved => &[LeadStatus::Converted],
        LeadStatus::Rejected | LeadStatus::Converted => &[],
    }
}

/// Validates a status transition.
///
/// # Errors
/// Returns `ModelError::InvalidTransition` when `to` is not reachable from `from`
pub fn validate_transition(from: LeadStatus, to: LeadStatus) -> Result<(), ModelError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(ModelError::InvalidTransition { from, to })
    }
}
