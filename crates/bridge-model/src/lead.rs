//! Lead records

use crate::activity::Actor;
use crate::category::ProductCategory;
use crate::error::ModelError;
use crate::ids::LeadId;
use crate::reference::ReferenceNumber;
use crate::status::LeadStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Open-shaped form payload: field name to arbitrary JSON value
pub type FormData = serde_json::Map<String, Value>;

/// Where a submission came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    /// Agent mobile client
    #[default]
    MobileApp,
    /// Web dashboard
    Web,
    /// Referral link
    Referral,
    /// Publicly shared form
    PublicForm,
}

impl LeadSource {
    /// Wire/storage name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            LeadSource::MobileApp => "mobile_app",
            LeadSource::Web => "web",
            LeadSource::Referral => "referral",
            LeadSource::PublicForm => "public_form",
        }
    }
}

impl Display for LeadSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadSource {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mobile_app" => Ok(LeadSource::MobileApp),
            "web" => Ok(LeadSource::Web),
            "referral" => Ok(LeadSource::Referral),
            "public_form" => Ok(LeadSource::PublicForm),
            other => Err(ModelError::UnknownSource(other.to_string())),
        }
    }
}

/// Customer contact details copied out of the form for quick lookup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickReference {
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
}

impl QuickReference {
    /// Pull contact fields from well-known form keys; the form is not modified
    #[must_use]
    pub fn from_form(form: &FormData) -> Self {
        let pick = |keys: &[&str]| {
            keys.iter().find_map(|k| {
                form.get(*k)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            })
        };
        Self {
            customer_name: pick(&["customer_name", "full_name", "name"]),
            customer_email: pick(&["customer_email", "email"]),
            customer_phone: pick(&["customer_phone", "phone", "mobile"]),
        }
    }
}

/// Everything needed to insert a lead; the store assigns the reference
#[derive(Debug, Clone, PartialEq)]
pub struct NewLead {
    pub id: LeadId,
    pub category: ProductCategory,
    pub form_data: FormData,
    pub quick: QuickReference,
    pub source: LeadSource,
    pub referral_code: Option<String>,
    pub created_by: Actor,
    pub status: LeadStatus,
    pub created_at: DateTime<Utc>,
}

impl NewLead {
    /// New submitted lead stamped with the current time
    #[must_use]
    pub fn submitted(category: ProductCategory, form_data: FormData, created_by: Actor) -> Self {
        let quick = QuickReference::from_form(&form_data);
        Self {
            id: LeadId::new(),
            category,
            form_data,
            quick,
            source: LeadSource::default(),
            referral_code: None,
            created_by,
            status: LeadStatus::Submitted,
            created_at: Utc::now(),
        }
    }

    /// Start as a draft instead
    #[inline]
    #[must_use]
    pub fn as_draft(mut self) -> Self {
        self.status = LeadStatus::Draft;
        self
    }

    /// With source tag
    #[inline]
    #[must_use]
    pub fn with_source(mut self, source: LeadSource) -> Self {
        self.source = source;
        self
    }

    /// With referral code
    #[inline]
    #[must_use]
    pub fn with_referral_code(mut self, code: Option<String>) -> Self {
        self.referral_code = code.filter(|c| !c.trim().is_empty());
        self
    }

    /// With explicit creation time
    #[inline]
    #[must_use]
    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    /// Materialise the lead once a reference number has been assigned
    #[must_use]
    pub fn into_lead(self, reference_number: ReferenceNumber) -> Lead {
        Lead {
            id: self.id,
            reference_number,
            category: self.category,
            form_data: self.form_data,
            quick: self.quick,
            source: self.source,
            referral_code: self.referral_code,
            created_by: self.created_by,
            status: self.status,
            document_ref: None,
            document_attempts: 0,
            created_at: self.created_at,
            updated_at: self.created_at,
            converted_at: None,
        }
    }
}

/// One customer submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub reference_number: ReferenceNumber,
    pub category: ProductCategory,
    pub form_data: FormData,
    pub quick: QuickReference,
    pub source: LeadSource,
    pub referral_code: Option<String>,
    pub created_by: Actor,
    pub status: LeadStatus,
    /// Public location of the generated PDF, if any
    pub document_ref: Option<String>,
    /// Failed document attempts since the last success
    #[serde(default)]
    pub document_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub converted_at: Option<DateTime<Utc>>,
}

impl Lead {
    /// A document has been generated and stored
    #[inline]
    #[must_use]
    pub fn has_document(&self) -> bool {
        self.document_ref.is_some()
    }

    /// Whether the document stage should run for this lead at all
    #[inline]
    #[must_use]
    pub fn wants_document(&self) -> bool {
        !matches!(self.status, LeadStatus::Draft | LeadStatus::Rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActorRole;
    use crate::category::CategoryPrefix;
    use serde_json::json;

    fn form(v: Value) -> FormData {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn quick_reference_picks_known_keys() {
        let quick = QuickReference::from_form(&form(json!({
            "customer_name": "  Asha Rao ",
            "email": "asha@example.com",
            "phone": "",
            "mobile": "9876543210",
        })));
        assert_eq!(quick.customer_name.as_deref(), Some("Asha Rao"));
        assert_eq!(quick.customer_email.as_deref(), Some("asha@example.com"));
        assert_eq!(quick.customer_phone.as_deref(), Some("9876543210"));
    }

    #[test]
    fn quick_reference_ignores_non_strings() {
        let quick = QuickReference::from_form(&form(json!({"customer_name": 12})));
        assert_eq!(quick, QuickReference::default());
    }

    #[test]
    fn new_lead_into_lead_carries_fields() {
        let category = ProductCategory::new("life-insurance", "Life Insurance").unwrap();
        let actor = Actor::new("agent-7", ActorRole::Agent);
        let new = NewLead::submitted(category, form(json!({"customer_name": "A"})), actor)
            .with_source(LeadSource::Web)
            .with_referral_code(Some("  ".into()));
        assert_eq!(new.referral_code, None);

        let reference = ReferenceNumber::new(CategoryPrefix::new("LI").unwrap(), 2025, 1);
        let lead = new.clone().into_lead(reference);
        assert_eq!(lead.id, new.id);
        assert_eq!(lead.status, LeadStatus::Submitted);
        assert_eq!(lead.source, LeadSource::Web);
        assert!(!lead.has_document());
        assert!(lead.wants_document());
        assert_eq!(lead.updated_at, lead.created_at);
    }

    #[test]
    fn drafts_do_not_want_documents() {
        let category = ProductCategory::new("health-insurance", "Health Insurance").unwrap();
        let new = NewLead::submitted(category, FormData::new(), Actor::system()).as_draft();
        let reference = ReferenceNumber::new(CategoryPrefix::new("HI").unwrap(), 2025, 3);
        assert!(!new.into_lead(reference).wants_document());
    }
}
