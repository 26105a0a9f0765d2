//! Testing utilities for the Bridge workspace
//!
//! Sample forms, in-memory and failing collaborators, and a temp-dir
//! harness that wires a real SQLite store into an orchestrator.

#![allow(missing_docs)]

use async_trait::async_trait;
use bridge_artifact::{
    public_url, ArtifactKey, ArtifactStore, Checksum, StoreError, StoreErrorCode, StoredArtifact,
};
use bridge_core::{IntakeOrchestrator, StaticCatalog};
use bridge_model::{
    ActivityRecord, Actor, ActorRole, FormData, Lead, LeadId, LeadStatus, NewLead,
    ReferenceNumber,
};
use bridge_render::{DocumentRenderer, PdfRenderer, RenderContext, RenderError};
use bridge_store::{
    ChainReport, DatabaseConfig, LeadFilter, LeadRepository, LeadStats, RepositoryError,
    SqliteLeadStore,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Public base used by [`MemoryArtifactStore`]
pub const MEMORY_BASE_URL: &str = "https://cdn.test/media";

pub fn agent(id: &str) -> Actor {
    Actor::new(id, ActorRole::Agent)
}

pub fn admin(id: &str) -> Actor {
    Actor::new(id, ActorRole::Admin)
}

fn object(value: Value) -> FormData {
    match value {
        Value::Object(map) => map,
        _ => FormData::new(),
    }
}

/// Complete life insurance form with the given date of birth
pub fn life_form(date_of_birth: &str) -> FormData {
    object(json!({
        "customer_name": "Asha Rao",
        "email": "asha.rao@example.com",
        "phone": "+91 98765 43210",
        "date_of_birth": date_of_birth,
        "gender": "female",
        "coverage_amount": 2_500_000,
        "policy_term": 20,
        "nominee_name": "Ravi Rao",
        "nominee_relationship": "spouse",
        "annual_income": 1_800_000,
    }))
}

/// Complete health insurance form
pub fn health_form() -> FormData {
    object(json!({
        "customer_name": "Imran Sheikh",
        "email": "imran@example.com",
        "phone": "+91 91234 56780",
        "age": 42,
        "coverage_type": "family_floater",
        "sum_insured": "1000000",
        "pre_existing_conditions": "",
        "number_of_members": 4,
    }))
}

/// Complete car insurance form
pub fn car_form() -> FormData {
    object(json!({
        "customer_name": "Meera Iyer",
        "email": "meera@example.com",
        "phone": "+91 99887 76655",
        "vehicle_number": "KA 01 AB 1234",
        "vehicle_make": "Maruti",
        "vehicle_model": "Swift",
        "manufacturing_year": 2021,
        "insurance_type": "comprehensive",
        "is_new_vehicle": "no",
    }))
}

/// Artifact store holding objects in memory, keyed by artifact key
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    puts: AtomicU32,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }

    /// Number of `put` calls, including no-op rewrites
    pub fn put_count(&self) -> u32 {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(
        &self,
        key: &ArtifactKey,
        bytes: &[u8],
        _content_type: &str,
    ) -> Result<StoredArtifact, StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let checksum = Checksum::of(bytes);
        let previous = self
            .objects
            .lock()
            .insert(key.as_str().to_string(), bytes.to_vec());
        Ok(StoredArtifact {
            key: key.clone(),
            location: self.location(key),
            checksum,
            size: bytes.len() as u64,
            unchanged: previous.is_some_and(|p| checksum.matches(&p)),
        })
    }

    async fn exists(&self, key: &ArtifactKey) -> Result<bool, StoreError> {
        Ok(self.objects.lock().contains_key(key.as_str()))
    }

    fn location(&self, key: &ArtifactKey) -> String {
        public_url(MEMORY_BASE_URL, key.as_str())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Fails the first `failures` puts with a network error, then delegates
#[derive(Debug)]
pub struct FlakyArtifactStore {
    inner: Arc<MemoryArtifactStore>,
    remaining: AtomicU32,
}

impl FlakyArtifactStore {
    pub fn new(inner: Arc<MemoryArtifactStore>, failures: u32) -> Self {
        Self {
            inner,
            remaining: AtomicU32::new(failures),
        }
    }

    /// A store that never accepts a write
    pub fn always_failing() -> Self {
        Self::new(Arc::new(MemoryArtifactStore::new()), u32::MAX)
    }
}

#[async_trait]
impl ArtifactStore for FlakyArtifactStore {
    async fn put(
        &self,
        key: &ArtifactKey,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<StoredArtifact, StoreError> {
        let failing = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::new(
                StoreErrorCode::Network,
                "bucket unreachable",
            ));
        }
        self.inner.put(key, bytes, content_type).await
    }

    async fn exists(&self, key: &ArtifactKey) -> Result<bool, StoreError> {
        self.inner.exists(key).await
    }

    fn location(&self, key: &ArtifactKey) -> String {
        self.inner.location(key)
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}

/// Sleeps for `delay` before delegating each put
#[derive(Debug)]
pub struct SlowArtifactStore {
    delay: Duration,
    inner: Arc<MemoryArtifactStore>,
}

impl SlowArtifactStore {
    pub fn new(inner: Arc<MemoryArtifactStore>, delay: Duration) -> Self {
        Self { delay, inner }
    }
}

#[async_trait]
impl ArtifactStore for SlowArtifactStore {
    async fn put(
        &self,
        key: &ArtifactKey,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<StoredArtifact, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.put(key, bytes, content_type).await
    }

    async fn exists(&self, key: &ArtifactKey) -> Result<bool, StoreError> {
        self.inner.exists(key).await
    }

    fn location(&self, key: &ArtifactKey) -> String {
        self.inner.location(key)
    }

    fn backend_name(&self) -> &'static str {
        "slow"
    }
}

/// Renderer that always fails
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingRenderer;

impl DocumentRenderer for FailingRenderer {
    fn render(&self, _lead: &Lead, _ctx: &RenderContext) -> Result<Vec<u8>, RenderError> {
        Err(RenderError::Encode("renderer offline".into()))
    }
}

/// Real renderer that blocks for `delay` first
#[derive(Debug, Default)]
pub struct SlowRenderer {
    delay: Duration,
    inner: PdfRenderer,
}

impl SlowRenderer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            inner: PdfRenderer::default(),
        }
    }
}

impl DocumentRenderer for SlowRenderer {
    fn render(&self, lead: &Lead, ctx: &RenderContext) -> Result<Vec<u8>, RenderError> {
        std::thread::sleep(self.delay);
        self.inner.render(lead, ctx)
    }
}

/// Repository whose every call fails as if the database were unreachable
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableRepository;

fn unavailable() -> RepositoryError {
    RepositoryError::Unavailable("database is locked".into())
}

#[async_trait]
impl LeadRepository for UnavailableRepository {
    async fn create_with_reference(
        &self,
        _new: NewLead,
    ) -> bridge_store::Result<(Lead, ActivityRecord)> {
        Err(unavailable())
    }

    async fn get(&self, _id: LeadId) -> bridge_store::Result<Option<Lead>> {
        Err(unavailable())
    }

    async fn get_by_reference(
        &self,
        _reference: &ReferenceNumber,
    ) -> bridge_store::Result<Option<Lead>> {
        Err(unavailable())
    }

    async fn transition_status(
        &self,
        _id: LeadId,
        _to: LeadStatus,
        _actor: Actor,
        _note: Option<String>,
    ) -> bridge_store::Result<(Lead, ActivityRecord)> {
        Err(unavailable())
    }

    async fn set_document_ref(
        &self,
        _id: LeadId,
        _location: String,
        _activity: ActivityRecord,
    ) -> bridge_store::Result<Lead> {
        Err(unavailable())
    }

    async fn record_document_failure(
        &self,
        _id: LeadId,
        _activity: ActivityRecord,
        _next_attempt_at: Option<DateTime<Utc>>,
    ) -> bridge_store::Result<Lead> {
        Err(unavailable())
    }

    async fn append_activity(&self, _activity: ActivityRecord) -> bridge_store::Result<ActivityRecord> {
        Err(unavailable())
    }

    async fn activities(&self, _id: LeadId) -> bridge_store::Result<Vec<ActivityRecord>> {
        Err(unavailable())
    }

    async fn verify_activity_chain(&self, _id: LeadId) -> bridge_store::Result<ChainReport> {
        Err(unavailable())
    }

    async fn list(&self, _filter: LeadFilter) -> bridge_store::Result<Vec<Lead>> {
        Err(unavailable())
    }

    async fn stats(&self, _created_by: Option<String>) -> bridge_store::Result<LeadStats> {
        Err(unavailable())
    }

    async fn leads_missing_document(
        &self,
        _now: DateTime<Utc>,
        _max_attempts: u32,
        _limit: u32,
    ) -> bridge_store::Result<Vec<Lead>> {
        Err(unavailable())
    }
}

/// SQLite store in a temp dir plus the built-in catalog
pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<SqliteLeadStore>,
    pub catalog: Arc<StaticCatalog>,
}

impl Harness {
    /// # Panics
    /// When the temp dir or database cannot be created
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let store = SqliteLeadStore::open(&DatabaseConfig::at(dir.path().join("bridge.sqlite3")))
            .expect("open store");
        let catalog = StaticCatalog::builtin().expect("builtin catalog");
        Self {
            dir,
            store: Arc::new(store),
            catalog: Arc::new(catalog),
        }
    }

    /// Orchestrator over the real PDF renderer and the given store
    pub fn orchestrator(&self, artifacts: Arc<dyn ArtifactStore>) -> IntakeOrchestrator {
        self.orchestrator_with(Arc::new(PdfRenderer::default()), artifacts)
    }

    pub fn orchestrator_with(
        &self,
        renderer: Arc<dyn DocumentRenderer>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> IntakeOrchestrator {
        IntakeOrchestrator::new(self.store.clone(), self.catalog.clone(), renderer, artifacts)
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
