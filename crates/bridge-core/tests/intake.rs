//! End-to-end intake tests over a temp-dir SQLite store

use bridge_core::{
    DocumentOutcome, DocumentRetryConfig, DocumentRetryWorker, IntakeError,
    IntakeOrchestrator, IntakeRequest, StaticCatalog,
};
use bridge_model::{ActivityKind, LeadStatus};
use bridge_render::PdfRenderer;
use bridge_store::{LeadFilter, LeadRepository};
use bridge_test_utils::{
    admin, agent, car_form, health_form, life_form, FailingRenderer, FlakyArtifactStore, Harness,
    MemoryArtifactStore, SlowArtifactStore, SlowRenderer, UnavailableRepository, MEMORY_BASE_URL,
};
use bridge_forms::ViolationCode;
use chrono::{Datelike, Months, Utc};
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

fn birth_date(years_ago: u32) -> String {
    let today = Utc::now().date_naive();
    today
        .checked_sub_months(Months::new(years_ago * 12))
        .unwrap()
        .format("%Y-%m-%d")
        .to_string()
}

fn kinds(activities: &[bridge_model::ActivityRecord]) -> Vec<ActivityKind> {
    activities.iter().map(|a| a.kind).collect()
}

fn immediate_retry() -> DocumentRetryConfig {
    DocumentRetryConfig {
        base_backoff_ms: 0,
        max_backoff_ms: 0,
        ..DocumentRetryConfig::default()
    }
}

#[tokio::test]
async fn submission_gets_reference_and_document() {
    let harness = Harness::new();
    let artifacts = Arc::new(MemoryArtifactStore::new());
    let orchestrator = harness.orchestrator(artifacts.clone());
    let year = Utc::now().year();

    let receipt = orchestrator
        .submit(IntakeRequest::new("life-insurance", life_form(&birth_date(30)), agent("agent-1")))
        .await
        .unwrap();

    assert_eq!(receipt.reference_number.to_string(), format!("LI-{year}-1"));
    assert_eq!(receipt.status, LeadStatus::Submitted);
    let url = receipt.document_url.clone().unwrap();
    assert!(url.starts_with(&format!("{MEMORY_BASE_URL}/lead_pdfs/{year}/")));
    assert!(url.contains(&format!("/LI-{year}-1_")));
    assert!(url.ends_with(".pdf"));

    let keys = artifacts.keys();
    assert_eq!(keys.len(), 1);
    assert!(artifacts.get(&keys[0]).unwrap().starts_with(b"%PDF"));

    let lead = orchestrator.get(receipt.lead_id).await.unwrap();
    assert_eq!(lead.document_ref.as_deref(), Some(url.as_str()));
    assert_eq!(lead.document_attempts, 0);
    assert_eq!(lead.created_by.id, "agent-1");

    let activities = orchestrator.activities(lead.id).await.unwrap();
    assert_eq!(
        kinds(&activities),
        vec![ActivityKind::Created, ActivityKind::DocumentGenerated]
    );
    assert_eq!(activities[1].metadata["location"], url.as_str());
    assert!(orchestrator.verify_chain(lead.id).await.unwrap().is_intact());
}

#[tokio::test]
async fn references_are_per_category() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator(Arc::new(MemoryArtifactStore::new()));
    let year = Utc::now().year();

    let mut refs = Vec::new();
    for (category, form) in [
        ("health-insurance", health_form()),
        ("health-insurance", health_form()),
        ("car-insurance", car_form()),
    ] {
        let receipt = orchestrator
            .submit(IntakeRequest::new(category, form, agent("agent-1")))
            .await
            .unwrap();
        refs.push(receipt.reference_number.to_string());
    }
    assert_eq!(
        refs,
        vec![
            format!("HI-{year}-1"),
            format!("HI-{year}-2"),
            format!("CI-{year}-1"),
        ]
    );
}

#[tokio::test]
async fn every_missing_field_is_reported_and_nothing_is_written() {
    let harness = Harness::new();
    let artifacts = Arc::new(MemoryArtifactStore::new());
    let orchestrator = harness.orchestrator(artifacts.clone());

    let mut form = life_form(&birth_date(30));
    form.remove("email");
    form.remove("nominee_name");

    let err = orchestrator
        .submit(IntakeRequest::new("life-insurance", form, agent("agent-1")))
        .await
        .unwrap_err();
    let IntakeError::Validation(errors) = &err else {
        panic!("expected validation error, got {err:?}");
    };
    let mut fields: Vec<&str> = errors.0.iter().map(|v| v.field.as_str()).collect();
    fields.sort_unstable();
    assert_eq!(fields, vec!["email", "nominee_name"]);
    assert!(errors.0.iter().all(|v| v.code == ViolationCode::Required));
    assert!(err.is_caller_error());

    assert_eq!(orchestrator.stats(None).await.unwrap().total, 0);
    assert!(artifacts.is_empty());
}

#[tokio::test]
async fn underage_applicant_does_not_consume_a_reference() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator(Arc::new(MemoryArtifactStore::new()));
    let year = Utc::now().year();

    let err = orchestrator
        .submit(IntakeRequest::new("life-insurance", life_form(&birth_date(17)), agent("agent-1")))
        .await
        .unwrap_err();
    let IntakeError::Validation(errors) = err else {
        panic!("expected validation error");
    };
    assert_eq!(errors.0.len(), 1);
    assert_eq!(errors.0[0].field, "date_of_birth");
    assert_eq!(errors.0[0].code, ViolationCode::AgeOutOfRange);

    let receipt = orchestrator
        .submit(IntakeRequest::new("life-insurance", life_form(&birth_date(30)), agent("agent-1")))
        .await
        .unwrap();
    assert_eq!(receipt.reference_number.to_string(), format!("LI-{year}-1"));
}

#[tokio::test]
async fn unknown_category_is_a_caller_error() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator(Arc::new(MemoryArtifactStore::new()));

    let err = orchestrator
        .submit(IntakeRequest::new("pet-insurance", health_form(), agent("agent-1")))
        .await
        .unwrap_err();
    assert!(matches!(err, IntakeError::UnknownCategory(ref id) if id == "pet-insurance"));
    assert!(err.is_caller_error());
}

#[tokio::test]
async fn render_failure_still_accepts_the_lead() {
    let harness = Harness::new();
    let artifacts = Arc::new(MemoryArtifactStore::new());
    let orchestrator = harness.orchestrator_with(Arc::new(FailingRenderer), artifacts.clone());

    let receipt = orchestrator
        .submit(IntakeRequest::new("health-insurance", health_form(), agent("agent-1")))
        .await
        .unwrap();
    assert_eq!(receipt.document_url, None);
    assert!(artifacts.is_empty());

    let lead = orchestrator.get(receipt.lead_id).await.unwrap();
    assert_eq!(lead.status, LeadStatus::Submitted);
    assert_eq!(lead.document_ref, None);
    assert_eq!(lead.document_attempts, 1);

    let activities = orchestrator.activities(lead.id).await.unwrap();
    assert_eq!(
        kinds(&activities),
        vec![ActivityKind::Created, ActivityKind::DocumentFailed]
    );
    assert_eq!(activities[1].metadata["stage"], "render");
    assert_eq!(activities[1].metadata["attempt"], 1);
}

#[tokio::test]
async fn store_failure_still_accepts_the_lead() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator(Arc::new(FlakyArtifactStore::always_failing()));

    let receipt = orchestrator
        .submit(IntakeRequest::new("car-insurance", car_form(), agent("agent-1")))
        .await
        .unwrap();
    assert_eq!(receipt.document_url, None);

    let activities = orchestrator.activities(receipt.lead_id).await.unwrap();
    let failed = activities.last().unwrap();
    assert_eq!(failed.kind, ActivityKind::DocumentFailed);
    assert_eq!(failed.metadata["stage"], "store");
    assert!(failed.description.contains("bucket unreachable"));
}

#[tokio::test]
async fn slow_render_times_out_without_failing_submission() {
    let harness = Harness::new();
    let artifacts = Arc::new(MemoryArtifactStore::new());
    let orchestrator = harness
        .orchestrator_with(
            Arc::new(SlowRenderer::new(Duration::from_millis(400))),
            artifacts.clone(),
        )
        .with_timeouts(Duration::from_millis(25), Duration::from_secs(5));

    let receipt = orchestrator
        .submit(IntakeRequest::new("health-insurance", health_form(), agent("agent-1")))
        .await
        .unwrap();
    assert_eq!(receipt.document_url, None);

    let activities = orchestrator.activities(receipt.lead_id).await.unwrap();
    let failed = activities.last().unwrap();
    assert_eq!(failed.metadata["stage"], "render");
    assert!(failed.description.contains("timed out after 25ms"));
    assert!(artifacts.is_empty());
}

#[tokio::test]
async fn slow_upload_times_out_and_is_queued_for_retry() {
    let harness = Harness::new();
    let memory = Arc::new(MemoryArtifactStore::new());
    let orchestrator = harness
        .orchestrator(Arc::new(SlowArtifactStore::new(
            memory.clone(),
            Duration::from_millis(400),
        )))
        .with_timeouts(Duration::from_secs(5), Duration::from_millis(25))
        .with_document_retry(immediate_retry());

    let receipt = orchestrator
        .submit(IntakeRequest::new("health-insurance", health_form(), agent("agent-1")))
        .await
        .unwrap();
    assert_eq!(receipt.status, LeadStatus::Submitted);
    assert_eq!(receipt.document_url, None);

    let activities = orchestrator.activities(receipt.lead_id).await.unwrap();
    let failed = activities.last().unwrap();
    assert_eq!(failed.kind, ActivityKind::DocumentFailed);
    assert_eq!(failed.metadata["stage"], "store");
    assert!(failed.description.contains("timed out after 25ms"));
    assert!(memory.is_empty());

    let queued = harness
        .store
        .leads_missing_document(Utc::now(), DocumentRetryConfig::default().max_attempts, 10)
        .await
        .unwrap();
    assert_eq!(
        queued.iter().map(|l| l.id).collect::<Vec<_>>(),
        vec![receipt.lead_id]
    );
    assert_eq!(queued[0].document_attempts, 1);
}

#[tokio::test]
async fn overlapping_document_runs_for_one_lead_collapse() {
    let harness = Harness::new();
    let memory = Arc::new(MemoryArtifactStore::new());
    let orchestrator = harness.orchestrator(Arc::new(SlowArtifactStore::new(
        memory.clone(),
        Duration::from_millis(300),
    )));
    let id = orchestrator
        .submit(IntakeRequest::new("health-insurance", health_form(), agent("agent-1")))
        .await
        .unwrap()
        .lead_id;
    assert_eq!(memory.put_count(), 1);

    let (a, b) = tokio::join!(
        orchestrator.regenerate_document(id),
        orchestrator.regenerate_document(id)
    );
    let outcomes = [a.unwrap(), b.unwrap()];
    let skipped = outcomes
        .iter()
        .filter(|o| matches!(o, DocumentOutcome::Skipped))
        .count();
    let stored = outcomes
        .iter()
        .filter(|o| matches!(o, DocumentOutcome::Stored(_)))
        .count();
    assert_eq!((stored, skipped), (1, 1));
    assert_eq!(memory.put_count(), 2);
}

#[tokio::test]
async fn transitions_follow_the_status_graph() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator(Arc::new(MemoryArtifactStore::new()));
    let id = orchestrator
        .submit(IntakeRequest::new("health-insurance", health_form(), agent("agent-1")))
        .await
        .unwrap()
        .lead_id;

    let err = orchestrator
        .transition(id, LeadStatus::Converted, admin("admin-1"), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        IntakeError::InvalidTransition { from: LeadStatus::Submitted, to: LeadStatus::Converted }
    ));
    assert_eq!(orchestrator.get(id).await.unwrap().status, LeadStatus::Submitted);

    for to in [LeadStatus::InProgress, LeadStatus::Approved, LeadStatus::Converted] {
        let lead = orchestrator
            .transition(id, to, admin("admin-1"), Some("checked".into()))
            .await
            .unwrap();
        assert_eq!(lead.status, to);
    }
    let lead = orchestrator.get(id).await.unwrap();
    assert!(lead.converted_at.is_some());

    let changes: Vec<_> = orchestrator
        .activities(id)
        .await
        .unwrap()
        .into_iter()
        .filter(|a| a.kind == ActivityKind::StatusChange)
        .collect();
    assert_eq!(changes.len(), 3);
    assert_eq!(changes[2].metadata["old_status"], "approved");
    assert_eq!(changes[2].metadata["new_status"], "converted");
    assert_eq!(changes[0].actor.id, "admin-1");
}

#[tokio::test]
async fn rejected_is_terminal() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator(Arc::new(MemoryArtifactStore::new()));
    let id = orchestrator
        .submit(IntakeRequest::new("health-insurance", health_form(), agent("agent-1")))
        .await
        .unwrap()
        .lead_id;

    orchestrator
        .transition(id, LeadStatus::InProgress, admin("admin-1"), None)
        .await
        .unwrap();
    orchestrator
        .transition(id, LeadStatus::Rejected, admin("admin-1"), Some("duplicate".into()))
        .await
        .unwrap();

    for to in LeadStatus::ALL {
        let err = orchestrator
            .transition(id, to, admin("admin-1"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, IntakeError::InvalidTransition { .. }), "{to}");
    }
    assert!(matches!(
        orchestrator.regenerate_document(id).await,
        Err(IntakeError::DocumentNotApplicable(LeadStatus::Rejected))
    ));
}

#[tokio::test]
async fn drafts_skip_validation_until_submitted() {
    let harness = Harness::new();
    let artifacts = Arc::new(MemoryArtifactStore::new());
    let orchestrator = harness.orchestrator(artifacts.clone());

    let mut partial = health_form();
    partial.remove("phone");
    let draft = orchestrator
        .submit(IntakeRequest::new("health-insurance", partial, agent("agent-1")).as_draft())
        .await
        .unwrap();
    assert_eq!(draft.status, LeadStatus::Draft);
    assert_eq!(draft.document_url, None);
    assert_eq!(artifacts.put_count(), 0);

    let err = orchestrator
        .submit_draft(draft.lead_id, agent("agent-1"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, IntakeError::Validation(ref e) if e.0[0].field == "phone"));
    assert_eq!(
        orchestrator.get(draft.lead_id).await.unwrap().status,
        LeadStatus::Draft
    );
    assert!(matches!(
        orchestrator.regenerate_document(draft.lead_id).await,
        Err(IntakeError::DocumentNotApplicable(LeadStatus::Draft))
    ));

    let complete = orchestrator
        .submit(IntakeRequest::new("health-insurance", health_form(), agent("agent-1")).as_draft())
        .await
        .unwrap();
    let receipt = orchestrator
        .submit_draft(complete.lead_id, agent("agent-1"), Some("customer confirmed".into()))
        .await
        .unwrap();
    assert_eq!(receipt.status, LeadStatus::Submitted);
    assert!(receipt.document_url.is_some());
    assert_eq!(receipt.reference_number, complete.reference_number);
}

#[tokio::test]
async fn notes_extend_the_activity_chain() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator(Arc::new(MemoryArtifactStore::new()));
    let id = orchestrator
        .submit(IntakeRequest::new("car-insurance", car_form(), agent("agent-1")))
        .await
        .unwrap()
        .lead_id;

    let err = orchestrator.add_note(id, agent("agent-1"), "   ").await.unwrap_err();
    assert!(matches!(err, IntakeError::Validation(_)));

    let note = orchestrator
        .add_note(id, agent("agent-1"), " called the customer ")
        .await
        .unwrap();
    assert_eq!(note.kind, ActivityKind::NoteAdded);
    assert_eq!(note.description, "called the customer");
    assert!(note.hash.is_some());

    let report = orchestrator.verify_chain(id).await.unwrap();
    assert_eq!(report.entries, 3);
    assert!(report.is_intact());
}

#[tokio::test]
async fn regenerating_replaces_the_same_object() {
    let harness = Harness::new();
    let artifacts = Arc::new(MemoryArtifactStore::new());
    let orchestrator = harness.orchestrator(artifacts.clone());
    let receipt = orchestrator
        .submit(IntakeRequest::new("life-insurance", life_form(&birth_date(40)), agent("agent-1")))
        .await
        .unwrap();

    let outcome = orchestrator.regenerate_document(receipt.lead_id).await.unwrap();
    let DocumentOutcome::Stored(stored) = outcome else {
        panic!("expected stored outcome, got {outcome:?}");
    };
    assert_eq!(Some(stored.location.clone()), receipt.document_url);
    assert!(stored.unchanged);
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts.put_count(), 2);
}

#[tokio::test]
async fn retry_pass_recovers_a_failed_upload() {
    let harness = Harness::new();
    let memory = Arc::new(MemoryArtifactStore::new());
    let orchestrator = harness
        .orchestrator(Arc::new(FlakyArtifactStore::new(memory.clone(), 1)))
        .with_document_retry(immediate_retry());

    let receipt = orchestrator
        .submit(IntakeRequest::new("health-insurance", health_form(), agent("agent-1")))
        .await
        .unwrap();
    assert_eq!(receipt.document_url, None);

    let summary = orchestrator.retry_due_documents().await.unwrap();
    assert_eq!(summary.scanned, 1);
    assert_eq!(summary.stored, 1);

    let lead = orchestrator.get(receipt.lead_id).await.unwrap();
    assert!(lead.has_document());
    assert_eq!(lead.document_attempts, 0);
    assert_eq!(memory.len(), 1);

    let again = orchestrator.retry_due_documents().await.unwrap();
    assert_eq!(again.scanned, 0);
}

#[tokio::test]
async fn retries_stop_when_the_budget_is_spent() {
    let harness = Harness::new();
    let orchestrator = harness
        .orchestrator(Arc::new(FlakyArtifactStore::always_failing()))
        .with_document_retry(DocumentRetryConfig {
            max_attempts: 2,
            ..immediate_retry()
        });

    let id = orchestrator
        .submit(IntakeRequest::new("health-insurance", health_form(), agent("agent-1")))
        .await
        .unwrap()
        .lead_id;

    let first = orchestrator.retry_due_documents().await.unwrap();
    assert_eq!((first.scanned, first.failed), (1, 1));
    let second = orchestrator.retry_due_documents().await.unwrap();
    assert_eq!(second.scanned, 0);

    let lead = orchestrator.get(id).await.unwrap();
    assert_eq!(lead.document_attempts, 2);
    assert_eq!(lead.status, LeadStatus::Submitted);
    let failures = orchestrator
        .activities(id)
        .await
        .unwrap()
        .into_iter()
        .filter(|a| a.kind == ActivityKind::DocumentFailed)
        .count();
    assert_eq!(failures, 2);
}

#[tokio::test]
async fn worker_runs_until_shutdown() {
    let harness = Harness::new();
    let memory = Arc::new(MemoryArtifactStore::new());
    let orchestrator = Arc::new(
        harness
            .orchestrator(Arc::new(FlakyArtifactStore::new(memory.clone(), 1)))
            .with_document_retry(immediate_retry()),
    );
    let id = orchestrator
        .submit(IntakeRequest::new("car-insurance", car_form(), agent("agent-1")))
        .await
        .unwrap()
        .lead_id;

    let (tx, rx) = tokio::sync::watch::channel(false);
    let handle = DocumentRetryWorker::new(orchestrator.clone())
        .with_interval(Duration::from_millis(10))
        .spawn(rx);

    let mut stored = false;
    for _ in 0..200 {
        if orchestrator.get(id).await.unwrap().has_document() {
            stored = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(stored);
}

#[tokio::test]
async fn unavailable_store_is_a_retryable_allocation_failure() {
    let orchestrator = IntakeOrchestrator::new(
        Arc::new(UnavailableRepository),
        Arc::new(StaticCatalog::builtin().unwrap()),
        Arc::new(PdfRenderer::default()),
        Arc::new(MemoryArtifactStore::new()),
    );

    let err = orchestrator
        .submit(IntakeRequest::new("health-insurance", health_form(), agent("agent-1")))
        .await
        .unwrap_err();
    assert!(matches!(err, IntakeError::AllocationFailure(_)));
    assert!(err.is_retryable());
    assert!(!err.is_caller_error());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_get_distinct_references() {
    let harness = Harness::new();
    let orchestrator = Arc::new(harness.orchestrator(Arc::new(MemoryArtifactStore::new())));

    let tasks: Vec<_> = (0..24)
        .map(|_| {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                orchestrator
                    .submit(IntakeRequest::new("health-insurance", health_form(), agent("agent-1")))
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut sequences = HashSet::new();
    for task in tasks {
        let receipt = task.await.unwrap();
        assert!(receipt.document_url.is_some());
        sequences.insert(receipt.reference_number.sequence());
    }
    assert_eq!(sequences, (1..=24).collect::<HashSet<u64>>());

    let listed = orchestrator
        .list(LeadFilter::default().with_status(LeadStatus::Submitted).with_limit(100))
        .await
        .unwrap();
    assert_eq!(listed.len(), 24);
    let stats = harness.store.stats(Some("agent-1".into())).await.unwrap();
    assert_eq!(stats.with_document, 24);
}
