//! HTTP contract tests through warp's in-process test client

use bridge_core::IntakeOrchestrator;
use bridge_intake::routes;
use bridge_test_utils::{health_form, FailingRenderer, Harness, MemoryArtifactStore};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::test::request;

fn orchestrator(harness: &Harness) -> Arc<IntakeOrchestrator> {
    Arc::new(harness.orchestrator(Arc::new(MemoryArtifactStore::new())))
}

fn body(resp: &warp::http::Response<warp::hyper::body::Bytes>) -> Value {
    serde_json::from_slice(resp.body()).unwrap()
}

async fn create(api: &Arc<IntakeOrchestrator>, payload: Value) -> warp::http::Response<warp::hyper::body::Bytes> {
    request()
        .method("POST")
        .path("/api/leads")
        .header("x-actor-id", "agent-9")
        .json(&payload)
        .reply(&routes(api.clone()))
        .await
}

#[tokio::test]
async fn health_is_ok() {
    let harness = Harness::new();
    let resp = request()
        .path("/health")
        .reply(&routes(orchestrator(&harness)))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body(&resp)["status"], "ok");
}

#[tokio::test]
async fn create_then_fetch() {
    let harness = Harness::new();
    let api = orchestrator(&harness);

    let resp = create(
        &api,
        json!({ "category": "health-insurance", "formData": health_form(), "source": "web" }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let receipt = body(&resp);
    assert!(receipt["referenceNumber"].as_str().unwrap().starts_with("HI-"));
    assert_eq!(receipt["status"], "submitted");
    assert!(receipt["documentUrl"].as_str().unwrap().ends_with(".pdf"));

    let id = receipt["leadId"].as_str().unwrap();
    let resp = request()
        .path(&format!("/api/leads/{id}"))
        .reply(&routes(api.clone()))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let lead = body(&resp);
    assert_eq!(lead["source"], "web");
    assert_eq!(lead["created_by"]["id"], "agent-9");

    let resp = request()
        .path(&format!("/api/references/{}", receipt["referenceNumber"].as_str().unwrap()))
        .reply(&routes(api.clone()))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body(&resp)["id"], id);

    let resp = request()
        .path(&format!("/api/leads/{id}/activities"))
        .reply(&routes(api))
        .await;
    let kinds: Vec<Value> = body(&resp)
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["kind"].clone())
        .collect();
    assert_eq!(kinds, vec![json!("created"), json!("document_generated")]);
}

#[tokio::test]
async fn validation_errors_list_every_field() {
    let harness = Harness::new();
    let api = orchestrator(&harness);
    let mut form = health_form();
    form.remove("email");
    form.insert("age".into(), json!(140));

    let resp = create(&api, json!({ "category": "health-insurance", "formData": form })).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let err = body(&resp);
    assert_eq!(err["error"], "validation_failed");
    assert_eq!(err["retriable"], false);
    let mut fields: Vec<&str> = err["violations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["field"].as_str().unwrap())
        .collect();
    fields.sort_unstable();
    assert_eq!(fields, vec!["age", "email"]);
}

#[tokio::test]
async fn unknown_category_and_missing_actor() {
    let harness = Harness::new();
    let api = orchestrator(&harness);

    let resp = create(&api, json!({ "category": "pet", "formData": {} })).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(&resp)["error"], "unknown_category");

    let resp = request()
        .method("POST")
        .path("/api/leads")
        .json(&json!({ "category": "health-insurance", "formData": health_form() }))
        .reply(&routes(api))
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn status_changes_follow_the_graph() {
    let harness = Harness::new();
    let api = orchestrator(&harness);
    let receipt = body(&create(&api, json!({ "category": "health-insurance", "formData": health_form() })).await);
    let id = receipt["leadId"].as_str().unwrap().to_string();

    let patch = |status: &str| {
        request()
            .method("PATCH")
            .path(&format!("/api/leads/{id}/status"))
            .header("x-actor-id", "admin-1")
            .header("x-actor-role", "admin")
            .json(&json!({ "status": status, "note": "reviewed" }))
    };

    let resp = patch("converted").reply(&routes(api.clone())).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(body(&resp)["error"], "invalid_transition");

    let resp = patch("in_progress").reply(&routes(api.clone())).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body(&resp)["status"], "in_progress");

    let resp = patch("paid").reply(&routes(api)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn notes_listing_and_stats() {
    let harness = Harness::new();
    let api = orchestrator(&harness);
    let receipt = body(&create(&api, json!({ "category": "health-insurance", "formData": health_form() })).await);
    let id = receipt["leadId"].as_str().unwrap();

    let resp = request()
        .method("POST")
        .path(&format!("/api/leads/{id}/notes"))
        .header("x-actor-id", "agent-9")
        .json(&json!({ "text": "customer asked for a callback" }))
        .reply(&routes(api.clone()))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(body(&resp)["kind"], "note_added");

    let resp = request()
        .path("/api/leads?status=submitted&category=health-insurance")
        .reply(&routes(api.clone()))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body(&resp).as_array().unwrap().len(), 1);

    let resp = request()
        .path("/api/leads/stats?created_by=agent-9")
        .reply(&routes(api.clone()))
        .await;
    let stats = body(&resp);
    assert_eq!(stats["total"], 1);
    assert_eq!(stats["by_status"]["submitted"], 1);
    assert_eq!(stats["with_document"], 1);

    let resp = request()
        .path(&format!("/api/leads/{id}/verify"))
        .reply(&routes(api))
        .await;
    assert_eq!(body(&resp)["broken_at"], Value::Null);
}

#[tokio::test]
async fn document_regeneration_reports_failure() {
    let harness = Harness::new();
    let api = Arc::new(harness.orchestrator_with(
        Arc::new(FailingRenderer),
        Arc::new(MemoryArtifactStore::new()),
    ));
    let resp = create(&api, json!({ "category": "health-insurance", "formData": health_form() })).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let receipt = body(&resp);
    assert_eq!(receipt["documentUrl"], Value::Null);
    let id = receipt["leadId"].as_str().unwrap();

    let resp = request()
        .method("POST")
        .path(&format!("/api/leads/{id}/document"))
        .header("x-actor-id", "admin-1")
        .reply(&routes(api))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let outcome = body(&resp);
    assert_eq!(outcome["outcome"], "failed");
    assert_eq!(outcome["stage"], "render");
}

#[tokio::test]
async fn unknown_lead_and_bad_id() {
    let harness = Harness::new();
    let api = orchestrator(&harness);

    let resp = request()
        .path("/api/leads/01ARZ3NDEKTSV4RRFFQ69G5FAV")
        .reply(&routes(api.clone()))
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body(&resp)["error"], "not_found");

    let resp = request()
        .path("/api/leads/not-an-id")
        .reply(&routes(api))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
