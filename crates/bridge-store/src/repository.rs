//! Persistence seams used by the intake pipeline

use crate::chain::ChainReport;
use crate::error::Result;
use async_trait::async_trait;
use bridge_model::{
    ActivityRecord, Actor, CategoryPrefix, Lead, LeadId, LeadStatus, NewLead, ReferenceNumber,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Durable per-`(prefix, year)` counter.
///
/// Each call performs one atomic increment-and-read in the durable store.
/// A returned number is retired for good, whether or not the caller uses it.
#[async_trait]
pub trait ReferenceAllocator: Send + Sync {
    /// Next reference for `prefix` in `year`, starting at 1
    async fn allocate(&self, prefix: CategoryPrefix, year: i32) -> Result<ReferenceNumber>;

    /// Last issued sequence, if any
    async fn current(&self, prefix: CategoryPrefix, year: i32) -> Result<Option<u64>>;
}

/// Lead listing filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadFilter {
    pub status: Option<LeadStatus>,
    pub category_id: Option<String>,
    pub created_by: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl LeadFilter {
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: LeadStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_category(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = Some(category_id.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_creator(mut self, actor_id: impl Into<String>) -> Self {
        self.created_by = Some(actor_id.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Per-status counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LeadStats {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    /// Leads with a stored document
    pub with_document: u64,
}

impl LeadStats {
    #[must_use]
    pub fn count(&self, status: LeadStatus) -> u64 {
        self.by_status.get(status.as_str()).copied().unwrap_or(0)
    }
}

/// Leads and their append-only activity log.
///
/// The orchestrator is the only writer of `status` and `document_ref`.
#[async_trait]
pub trait LeadRepository: Send + Sync {
    /// Insert `new`, allocating its reference and appending the `created`
    /// activity, all in one transaction. Nothing is written on failure.
    async fn create_with_reference(&self, new: NewLead) -> Result<(Lead, ActivityRecord)>;

    async fn get(&self, id: LeadId) -> Result<Option<Lead>>;

    async fn get_by_reference(&self, reference: &ReferenceNumber) -> Result<Option<Lead>>;

    /// Move `id` to `to` if the graph allows it, recording who did it
    async fn transition_status(
        &self,
        id: LeadId,
        to: LeadStatus,
        actor: Actor,
        note: Option<String>,
    ) -> Result<(Lead, ActivityRecord)>;

    /// Attach the stored document and append its `document_generated` activity
    async fn set_document_ref(
        &self,
        id: LeadId,
        location: String,
        activity: ActivityRecord,
    ) -> Result<Lead>;

    /// Count a failed document attempt, schedule the next one, append the activity
    async fn record_document_failure(
        &self,
        id: LeadId,
        activity: ActivityRecord,
        next_attempt_at: Option<DateTime<Utc>>,
    ) -> Result<Lead>;

    /// Append one activity; `seq` and hashes are assigned here
    async fn append_activity(&self, activity: ActivityRecord) -> Result<ActivityRecord>;

    /// Activities of `id` in creation order
    async fn activities(&self, id: LeadId) -> Result<Vec<ActivityRecord>>;

    /// Re-walk the hash chain of `id`
    async fn verify_activity_chain(&self, id: LeadId) -> Result<ChainReport>;

    /// Newest first
    async fn list(&self, filter: LeadFilter) -> Result<Vec<Lead>>;

    async fn stats(&self, created_by: Option<String>) -> Result<LeadStats>;

    /// Leads still owed a document whose retry time has come
    async fn leads_missing_document(
        &self,
        now: DateTime<Utc>,
        max_attempts: u32,
        limit: u32,
    ) -> Result<Vec<Lead>>;
}
