//! Lead intake orchestrator
//!
//! Sequence for one submission:
//! 1. Validate the form against the category schema (nothing written on failure)
//! 2. Insert the lead, allocate its reference and log `created`, in one transaction
//! 3. Render the PDF on the blocking pool, bounded by the render timeout
//! 4. Upload it under the lead's deterministic key, bounded by the store timeout
//! 5. Attach the location, or log the failure and schedule a retry
//!
//! Steps 3-5 never fail the submission: once step 2 commits the lead exists
//! with its reference, and document problems only leave `document_ref` empty.

use crate::catalog::{CategorySpec, ProductCatalog, StaticCatalog};
use crate::config::{DocumentRetryConfig, IntakeConfig};
use crate::error::IntakeError;
use bridge_artifact::{build_artifact_store, ArtifactKey, ArtifactStore, StoredArtifact, PDF_CONTENT_TYPE};
use bridge_forms::{validate, FieldViolation, ValidationErrors, ViolationCode};
use bridge_model::{
    ActivityRecord, Actor, FormData, Lead, LeadId, LeadSource, LeadStatus, NewLead,
    ReferenceNumber,
};
use bridge_render::{DocumentRenderer, PdfRenderer, RenderContext, RenderError};
use bridge_store::{ChainReport, LeadFilter, LeadRepository, LeadStats, SqliteLeadStore};
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashSet;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Leads processed concurrently by one retry pass
const RETRY_CONCURRENCY: usize = 4;

/// One intake submission as received from the API layer
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeRequest {
    pub category_id: String,
    pub form_data: FormData,
    pub source: LeadSource,
    pub referral_code: Option<String>,
    /// Authenticated caller, trusted as given
    pub actor: Actor,
    pub draft: bool,
}

impl IntakeRequest {
    #[must_use]
    pub fn new(category_id: impl Into<String>, form_data: FormData, actor: Actor) -> Self {
        Self {
            category_id: category_id.into(),
            form_data,
            source: LeadSource::default(),
            referral_code: None,
            actor,
            draft: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_source(mut self, source: LeadSource) -> Self {
        self.source = source;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_referral_code(mut self, code: impl Into<String>) -> Self {
        self.referral_code = Some(code.into());
        self
    }

    /// Save without validating or generating a document
    #[inline]
    #[must_use]
    pub fn as_draft(mut self) -> Self {
        self.draft = true;
        self
    }
}

/// What the caller gets back for an accepted submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeReceipt {
    pub lead_id: LeadId,
    pub reference_number: ReferenceNumber,
    pub status: LeadStatus,
    /// `None` while the document is missing (degraded success)
    pub document_url: Option<String>,
}

impl From<&Lead> for IntakeReceipt {
    fn from(lead: &Lead) -> Self {
        Self {
            lead_id: lead.id,
            reference_number: lead.reference_number,
            status: lead.status,
            document_url: lead.document_ref.clone(),
        }
    }
}

/// Step of the document stage that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStage {
    Render,
    Store,
    /// Upload succeeded but the lead row could not be updated
    Record,
}

impl DocumentStage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            DocumentStage::Render => "render",
            DocumentStage::Store => "store",
            DocumentStage::Record => "record",
        }
    }
}

impl fmt::Display for DocumentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one render+store run for a lead
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DocumentOutcome {
    Stored(StoredArtifact),
    Failed { stage: DocumentStage, error: String },
    /// Another run for the same lead is in progress
    Skipped,
}

impl DocumentOutcome {
    /// Public location, when stored
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        match self {
            DocumentOutcome::Stored(stored) => Some(&stored.location),
            _ => None,
        }
    }
}

/// Counts from one background retry pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetrySummary {
    pub scanned: usize,
    pub stored: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Removes its lead from the in-flight set when dropped
struct InFlight<'a> {
    set: &'a DashSet<LeadId>,
    id: LeadId,
}

impl<'a> InFlight<'a> {
    fn acquire(set: &'a DashSet<LeadId>, id: LeadId) -> Option<Self> {
        set.insert(id).then_some(Self { set, id })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.id);
    }
}

/// Composes validation, persistence, rendering and storage.
///
/// The only component that changes a lead's `status` or `document_ref`.
pub struct IntakeOrchestrator {
    leads: Arc<dyn LeadRepository>,
    catalog: Arc<dyn ProductCatalog>,
    renderer: Arc<dyn DocumentRenderer>,
    artifacts: Arc<dyn ArtifactStore>,
    render_timeout: Duration,
    store_timeout: Duration,
    retry: DocumentRetryConfig,
    in_flight: DashSet<LeadId>,
}

impl fmt::Debug for IntakeOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntakeOrchestrator")
            .field("backend", &self.artifacts.backend_name())
            .field("render_timeout", &self.render_timeout)
            .field("store_timeout", &self.store_timeout)
            .field("retry", &self.retry)
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl IntakeOrchestrator {
    /// Assemble from parts, with default timeouts and retry settings
    #[must_use]
    pub fn new(
        leads: Arc<dyn LeadRepository>,
        catalog: Arc<dyn ProductCatalog>,
        renderer: Arc<dyn DocumentRenderer>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        let defaults = IntakeConfig::default();
        Self {
            leads,
            catalog,
            renderer,
            artifacts,
            render_timeout: defaults.render_timeout(),
            store_timeout: defaults.store_timeout(),
            retry: defaults.document_retry,
            in_flight: DashSet::new(),
        }
    }

    /// Open the database, load the catalog and select the storage backend
    ///
    /// # Errors
    /// Fails when any collaborator cannot be prepared, or when a catalog
    /// category names a template the renderer does not have
    pub fn from_config(config: &IntakeConfig) -> Result<Self, IntakeError> {
        let leads = SqliteLeadStore::open(&config.database).map_err(IntakeError::Repository)?;
        let catalog = match &config.catalog_path {
            Some(path) => StaticCatalog::load(path)?,
            None => StaticCatalog::builtin()?,
        };
        let renderer = PdfRenderer::default();
        for spec in catalog.categories() {
            if !renderer.templates().contains(&spec.template_id) {
                return Err(IntakeError::Catalog(format!(
                    "category {} uses unknown template {}",
                    spec.id(),
                    spec.template_id
                )));
            }
        }
        let artifacts = build_artifact_store(&config.storage)?;

        Ok(Self::new(
            Arc::new(leads),
            Arc::new(catalog),
            Arc::new(renderer),
            artifacts,
        )
        .with_timeouts(config.render_timeout(), config.store_timeout())
        .with_document_retry(config.document_retry))
    }

    #[inline]
    #[must_use]
    pub fn with_timeouts(mut self, render: Duration, store: Duration) -> Self {
        self.render_timeout = render;
        self.store_timeout = store;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_document_retry(mut self, retry: DocumentRetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[inline]
    #[must_use]
    pub fn catalog(&self) -> &dyn ProductCatalog {
        self.catalog.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn document_retry(&self) -> &DocumentRetryConfig {
        &self.retry
    }

    fn category(&self, id: &str) -> Result<&CategorySpec, IntakeError> {
        self.catalog
            .get(id)
            .ok_or_else(|| IntakeError::UnknownCategory(id.to_string()))
    }

    /// Accept a submission.
    ///
    /// Returns once the lead is durable; the receipt carries the document
    /// URL only if rendering and upload both succeeded in time.
    ///
    /// # Errors
    /// `Validation` or `UnknownCategory` before anything is written;
    /// `AllocationFailure` (retriable) if the lead could not be created
    pub async fn submit(&self, request: IntakeRequest) -> Result<IntakeReceipt, IntakeError> {
        let spec = self.category(&request.category_id)?;
        if !request.draft {
            let checked = validate(
                &spec.category,
                &request.form_data,
                &spec.schema,
                Utc::now().date_naive(),
            )?;
            tracing::debug!(category = %spec.id(), ages = ?checked.ages, "form validated");
        }

        let mut new = NewLead::submitted(spec.category.clone(), request.form_data, request.actor)
            .with_source(request.source)
            .with_referral_code(request.referral_code);
        if request.draft {
            new = new.as_draft();
        }

        let (lead, _) = self.leads.create_with_reference(new).await.map_err(|e| {
            tracing::error!(category = %spec.id(), error = %e, "reference allocation failed");
            IntakeError::AllocationFailure(e)
        })?;

        let mut receipt = IntakeReceipt::from(&lead);
        if lead.wants_document() {
            let outcome = self.generate_document(&lead).await;
            if matches!(outcome, DocumentOutcome::Skipped) {
                // the retry worker got there first; its run records the document
                tracing::debug!(lead_id = %lead.id, "document left to the in-flight run");
            }
            receipt.document_url = outcome.location().map(str::to_string);
        }
        tracing::info!(
            lead_id = %lead.id,
            reference = %lead.reference_number,
            status = %lead.status,
            document = receipt.document_url.is_some(),
            "lead accepted"
        );
        Ok(receipt)
    }

    /// # Errors
    /// `NotFound` for an unknown id
    pub async fn get(&self, id: LeadId) -> Result<Lead, IntakeError> {
        self.leads.get(id).await?.ok_or_else(|| IntakeError::not_found(id))
    }

    /// # Errors
    /// `NotFound` for an unknown reference
    pub async fn get_by_reference(&self, reference: &ReferenceNumber) -> Result<Lead, IntakeError> {
        self.leads
            .get_by_reference(reference)
            .await?
            .ok_or_else(|| IntakeError::NotFound(reference.to_string()))
    }

    /// # Errors
    /// `NotFound` for an unknown id
    pub async fn activities(&self, id: LeadId) -> Result<Vec<ActivityRecord>, IntakeError> {
        Ok(self.leads.activities(id).await?)
    }

    /// Move a lead along the status graph.
    ///
    /// Leaving `draft` validates the stored form first and then runs the
    /// document stage.
    ///
    /// # Errors
    /// `InvalidTransition` (state unchanged), `Validation` for an incomplete
    /// draft, `NotFound`
    pub async fn transition(
        &self,
        id: LeadId,
        to: LeadStatus,
        actor: Actor,
        note: Option<String>,
    ) -> Result<Lead, IntakeError> {
        if to == LeadStatus::Submitted {
            let current = self.get(id).await?;
            if current.status == LeadStatus::Draft {
                let spec = self.category(&current.category.id)?;
                validate(
                    &spec.category,
                    &current.form_data,
                    &spec.schema,
                    Utc::now().date_naive(),
                )?;
            }
        }

        let (lead, _) = self.leads.transition_status(id, to, actor, note).await?;
        if to == LeadStatus::Submitted && lead.wants_document() && !lead.has_document() {
            self.generate_document(&lead).await;
            return self.get(id).await;
        }
        Ok(lead)
    }

    /// `draft -> submitted`, then generate the document
    ///
    /// # Errors
    /// As [`IntakeOrchestrator::transition`]
    pub async fn submit_draft(
        &self,
        id: LeadId,
        actor: Actor,
        note: Option<String>,
    ) -> Result<IntakeReceipt, IntakeError> {
        let lead = self.transition(id, LeadStatus::Submitted, actor, note).await?;
        Ok(IntakeReceipt::from(&lead))
    }

    /// # Errors
    /// `Validation` for blank text, `NotFound`
    pub async fn add_note(
        &self,
        id: LeadId,
        actor: Actor,
        text: &str,
    ) -> Result<ActivityRecord, IntakeError> {
        if text.trim().is_empty() {
            return Err(IntakeError::Validation(ValidationErrors(vec![FieldViolation::new(
                "text",
                ViolationCode::Required,
                "note text is required",
            )])));
        }
        Ok(self
            .leads
            .append_activity(ActivityRecord::note(id, actor, text))
            .await?)
    }

    /// Re-run render+store with the lead's existing reference; the key is
    /// the same as before, so a previous upload is replaced, not duplicated.
    ///
    /// # Errors
    /// `NotFound`, or `DocumentNotApplicable` for draft and rejected leads
    pub async fn regenerate_document(&self, id: LeadId) -> Result<DocumentOutcome, IntakeError> {
        let lead = self.get(id).await?;
        if !lead.wants_document() {
            return Err(IntakeError::DocumentNotApplicable(lead.status));
        }
        Ok(self.generate_document(&lead).await)
    }

    /// # Errors
    /// Repository failures only
    pub async fn list(&self, filter: LeadFilter) -> Result<Vec<Lead>, IntakeError> {
        Ok(self.leads.list(filter).await?)
    }

    /// # Errors
    /// Repository failures only
    pub async fn stats(&self, created_by: Option<String>) -> Result<LeadStats, IntakeError> {
        Ok(self.leads.stats(created_by).await?)
    }

    /// # Errors
    /// `NotFound` for an unknown id
    pub async fn verify_chain(&self, id: LeadId) -> Result<ChainReport, IntakeError> {
        Ok(self.leads.verify_activity_chain(id).await?)
    }

    /// One pass over leads whose document is missing and due for a retry
    ///
    /// # Errors
    /// Only when the due list itself cannot be read
    pub async fn retry_due_documents(&self) -> Result<RetrySummary, IntakeError> {
        let due = self
            .leads
            .leads_missing_document(Utc::now(), self.retry.max_attempts, self.retry.batch_size)
            .await?;

        let mut summary = RetrySummary {
            scanned: due.len(),
            ..RetrySummary::default()
        };
        let outcomes: Vec<DocumentOutcome> = stream::iter(due)
            .map(|lead| async move { self.generate_document(&lead).await })
            .buffer_unordered(RETRY_CONCURRENCY)
            .collect()
            .await;
        for outcome in outcomes {
            match outcome {
                DocumentOutcome::Stored(_) => summary.stored += 1,
                DocumentOutcome::Failed { .. } => summary.failed += 1,
                DocumentOutcome::Skipped => summary.skipped += 1,
            }
        }
        Ok(summary)
    }

    /// Render, store and record; never fails the caller
    pub async fn generate_document(&self, lead: &Lead) -> DocumentOutcome {
        let Some(_guard) = InFlight::acquire(&self.in_flight, lead.id) else {
            tracing::debug!(lead_id = %lead.id, "document run already in flight");
            return DocumentOutcome::Skipped;
        };

        let ctx = self
            .catalog
            .get(&lead.category.id)
            .map_or_else(RenderContext::default, CategorySpec::render_context);
        let key = ArtifactKey::for_lead(lead);

        match self.render_and_store(lead, ctx, &key).await {
            Ok(stored) => self.record_success(lead, stored).await,
            Err((stage, error)) => self.record_failure(lead, stage, &error).await,
        }
    }

    async fn render_and_store(
        &self,
        lead: &Lead,
        ctx: RenderContext,
        key: &ArtifactKey,
    ) -> Result<StoredArtifact, (DocumentStage, IntakeError)> {
        let renderer = Arc::clone(&self.renderer);
        let owned = lead.clone();
        let rendering = tokio::task::spawn_blocking(move || renderer.render(&owned, &ctx));
        let bytes = match tokio::time::timeout(self.render_timeout, rendering).await {
            Err(_) => {
                return Err((
                    DocumentStage::Render,
                    IntakeError::Timeout {
                        stage: "render",
                        millis: millis(self.render_timeout),
                    },
                ))
            }
            Ok(Err(join)) => {
                return Err((
                    DocumentStage::Render,
                    IntakeError::Render(RenderError::Encode(join.to_string())),
                ))
            }
            Ok(Ok(result)) => result.map_err(|e| (DocumentStage::Render, IntakeError::from(e)))?,
        };

        match tokio::time::timeout(
            self.store_timeout,
            self.artifacts.put(key, &bytes, PDF_CONTENT_TYPE),
        )
        .await
        {
            Err(_) => Err((
                DocumentStage::Store,
                IntakeError::Timeout {
                    stage: "store",
                    millis: millis(self.store_timeout),
                },
            )),
            Ok(result) => result.map_err(|e| (DocumentStage::Store, IntakeError::from(e))),
        }
    }

    async fn record_success(&self, lead: &Lead, stored: StoredArtifact) -> DocumentOutcome {
        let activity = ActivityRecord::document_generated(
            lead.id,
            stored.key.as_str(),
            &stored.location,
            &stored.checksum.to_string(),
        );
        match self
            .leads
            .set_document_ref(lead.id, stored.location.clone(), activity)
            .await
        {
            Ok(_) => {
                tracing::info!(
                    lead_id = %lead.id,
                    reference = %lead.reference_number,
                    key = %stored.key.as_str(),
                    checksum = %stored.checksum.short(),
                    unchanged = stored.unchanged,
                    "document stored"
                );
                DocumentOutcome::Stored(stored)
            }
            Err(e) => {
                tracing::warn!(
                    lead_id = %lead.id,
                    key = %stored.key.as_str(),
                    error = %e,
                    "document stored but lead not updated"
                );
                DocumentOutcome::Failed {
                    stage: DocumentStage::Record,
                    error: e.to_string(),
                }
            }
        }
    }

    async fn record_failure(
        &self,
        lead: &Lead,
        stage: DocumentStage,
        error: &IntakeError,
    ) -> DocumentOutcome {
        let attempt = lead.document_attempts.saturating_add(1);
        let next_attempt_at = self.next_attempt_at(attempt);
        tracing::warn!(
            lead_id = %lead.id,
            reference = %lead.reference_number,
            %stage,
            attempt,
            retry_at = ?next_attempt_at,
            error = %error,
            "document generation failed"
        );

        let activity =
            ActivityRecord::document_failed(lead.id, stage.as_str(), &error.to_string(), attempt);
        if let Err(e) = self
            .leads
            .record_document_failure(lead.id, activity, next_attempt_at)
            .await
        {
            tracing::warn!(lead_id = %lead.id, error = %e, "document failure not recorded");
        }
        DocumentOutcome::Failed {
            stage,
            error: error.to_string(),
        }
    }

    /// When the next attempt is due, or `None` once the budget is spent
    fn next_attempt_at(&self, attempt: u32) -> Option<DateTime<Utc>> {
        let policy = self.retry.backoff();
        if !policy.should_retry(attempt) {
            return None;
        }
        let delay = TimeDelta::from_std(policy.jittered_delay(attempt)).ok()?;
        Utc::now().checked_add_signed(delay)
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
