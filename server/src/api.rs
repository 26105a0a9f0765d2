//! HTTP routes
//!
//! Identity comes from `x-actor-id` / `x-actor-role`, set by the auth layer
//! in front of this service and trusted as given.

use crate::error::{handle_rejection, ApiError};
use bridge_core::{DocumentOutcome, IntakeOrchestrator, IntakeRequest};
use bridge_model::{Actor, ActorRole, FormData, LeadId, LeadSource, LeadStatus, ReferenceNumber};
use bridge_store::LeadFilter;
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

/// Largest accepted JSON body
const MAX_BODY_BYTES: u64 = 256 * 1024;

type Shared = Arc<IntakeOrchestrator>;

/// `POST /api/leads` body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLead {
    pub category: String,
    pub form_data: FormData,
    #[serde(default)]
    pub source: LeadSource,
    pub referral_code: Option<String>,
    /// Save without validating; submit later via the status endpoint
    #[serde(default)]
    pub draft: bool,
}

/// `PATCH /api/leads/{id}/status` body
#[derive(Debug, Deserialize)]
pub struct ChangeStatus {
    pub status: String,
    pub note: Option<String>,
}

/// `POST /api/leads/{id}/notes` body
#[derive(Debug, Deserialize)]
pub struct AddNote {
    pub text: String,
}

/// `GET /api/leads` query
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub category: Option<String>,
    pub created_by: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// `GET /api/leads/stats` query
#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub created_by: Option<String>,
}

/// Every route, with rejections already turned into JSON errors
pub fn routes(
    orchestrator: Shared,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let health = warp::path!("health")
        .and(warp::get())
        .map(|| warp::reply::json(&json!({ "status": "ok" })).into_response());

    let create = warp::path!("api" / "leads")
        .and(warp::post())
        .and(with_orchestrator(orchestrator.clone()))
        .and(actor())
        .and(json_body::<CreateLead>())
        .and_then(create_lead);

    let list = warp::path!("api" / "leads")
        .and(warp::get())
        .and(with_orchestrator(orchestrator.clone()))
        .and(warp::query::<ListQuery>())
        .and_then(list_leads);

    let stats = warp::path!("api" / "leads" / "stats")
        .and(warp::get())
        .and(with_orchestrator(orchestrator.clone()))
        .and(warp::query::<StatsQuery>())
        .and_then(lead_stats);

    let by_reference = warp::path!("api" / "references" / String)
        .and(warp::get())
        .and(with_orchestrator(orchestrator.clone()))
        .and_then(get_by_reference);

    let show = warp::path!("api" / "leads" / String)
        .and(warp::get())
        .and(with_orchestrator(orchestrator.clone()))
        .and_then(get_lead);

    let activities = warp::path!("api" / "leads" / String / "activities")
        .and(warp::get())
        .and(with_orchestrator(orchestrator.clone()))
        .and_then(lead_activities);

    let verify = warp::path!("api" / "leads" / String / "verify")
        .and(warp::get())
        .and(with_orchestrator(orchestrator.clone()))
        .and_then(verify_chain);

    let status = warp::path!("api" / "leads" / String / "status")
        .and(warp::patch())
        .and(with_orchestrator(orchestrator.clone()))
        .and(actor())
        .and(json_body::<ChangeStatus>())
        .and_then(change_status);

    let notes = warp::path!("api" / "leads" / String / "notes")
        .and(warp::post())
        .and(with_orchestrator(orchestrator.clone()))
        .and(actor())
        .and(json_body::<AddNote>())
        .and_then(add_note);

    let document = warp::path!("api" / "leads" / String / "document")
        .and(warp::post())
        .and(with_orchestrator(orchestrator))
        .and(actor())
        .and_then(regenerate_document);

    health
        .or(create)
        .unify()
        .or(list)
        .unify()
        .or(stats)
        .unify()
        .or(by_reference)
        .unify()
        .or(show)
        .unify()
        .or(activities)
        .unify()
        .or(verify)
        .unify()
        .or(status)
        .unify()
        .or(notes)
        .unify()
        .or(document)
        .unify()
        .recover(handle_rejection)
        .unify()
        .with(warp::trace::request())
}

fn with_orchestrator(
    orchestrator: Shared,
) -> impl Filter<Extract = (Shared,), Error = Infallible> + Clone {
    warp::any().map(move || orchestrator.clone())
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

fn actor() -> impl Filter<Extract = (Actor,), Error = Rejection> + Clone {
    warp::header::optional::<String>("x-actor-id")
        .and(warp::header::optional::<String>("x-actor-role"))
        .and_then(|id: Option<String>, role: Option<String>| async move {
            actor_from_headers(id, role).map_err(warp::reject::custom)
        })
}

/// Build the caller identity; the role defaults to `agent`
///
/// # Errors
/// `Unauthenticated` without an id, `BadRequest` for an unknown role
pub fn actor_from_headers(id: Option<String>, role: Option<String>) -> Result<Actor, ApiError> {
    let id = id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or(ApiError::Unauthenticated)?;
    let role = match role {
        Some(raw) => raw
            .trim()
            .parse::<ActorRole>()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        None => ActorRole::default(),
    };
    Ok(Actor::new(id, role))
}

fn parse_id(raw: &str) -> Result<LeadId, Rejection> {
    raw.parse()
        .map_err(|e: bridge_model::ModelError| warp::reject::custom(ApiError::BadRequest(e.to_string())))
}

fn reject(err: impl Into<ApiError>) -> Rejection {
    warp::reject::custom(err.into())
}

fn json_reply<T: serde::Serialize>(value: &T, status: StatusCode) -> warp::reply::Response {
    warp::reply::with_status(warp::reply::json(value), status).into_response()
}

async fn create_lead(
    orchestrator: Shared,
    actor: Actor,
    body: CreateLead,
) -> Result<warp::reply::Response, Rejection> {
    let mut request = IntakeRequest::new(body.category, body.form_data, actor).with_source(body.source);
    if let Some(code) = body.referral_code.filter(|c| !c.trim().is_empty()) {
        request = request.with_referral_code(code);
    }
    if body.draft {
        request = request.as_draft();
    }
    let receipt = orchestrator.submit(request).await.map_err(reject)?;
    Ok(json_reply(&receipt, StatusCode::CREATED))
}

async fn list_leads(
    orchestrator: Shared,
    query: ListQuery,
) -> Result<warp::reply::Response, Rejection> {
    let mut filter = LeadFilter {
        category_id: query.category,
        created_by: query.created_by,
        limit: query.limit,
        offset: query.offset,
        ..LeadFilter::default()
    };
    if let Some(raw) = query.status {
        let status: LeadStatus = raw
            .parse()
            .map_err(|e: bridge_model::ModelError| reject(ApiError::BadRequest(e.to_string())))?;
        filter = filter.with_status(status);
    }
    let leads = orchestrator.list(filter).await.map_err(reject)?;
    Ok(json_reply(&leads, StatusCode::OK))
}

async fn lead_stats(
    orchestrator: Shared,
    query: StatsQuery,
) -> Result<warp::reply::Response, Rejection> {
    let stats = orchestrator.stats(query.created_by).await.map_err(reject)?;
    Ok(json_reply(&stats, StatusCode::OK))
}

async fn get_by_reference(
    raw: String,
    orchestrator: Shared,
) -> Result<warp::reply::Response, Rejection> {
    let reference: ReferenceNumber = raw
        .parse()
        .map_err(|e: bridge_model::ModelError| reject(ApiError::BadRequest(e.to_string())))?;
    let lead = orchestrator.get_by_reference(&reference).await.map_err(reject)?;
    Ok(json_reply(&lead, StatusCode::OK))
}

async fn get_lead(raw: String, orchestrator: Shared) -> Result<warp::reply::Response, Rejection> {
    let lead = orchestrator.get(parse_id(&raw)?).await.map_err(reject)?;
    Ok(json_reply(&lead, StatusCode::OK))
}

async fn lead_activities(
    raw: String,
    orchestrator: Shared,
) -> Result<warp::reply::Response, Rejection> {
    let activities = orchestrator.activities(parse_id(&raw)?).await.map_err(reject)?;
    Ok(json_reply(&activities, StatusCode::OK))
}

async fn verify_chain(raw: String, orchestrator: Shared) -> Result<warp::reply::Response, Rejection> {
    let report = orchestrator.verify_chain(parse_id(&raw)?).await.map_err(reject)?;
    Ok(json_reply(&report, StatusCode::OK))
}

async fn change_status(
    raw: String,
    orchestrator: Shared,
    actor: Actor,
    body: ChangeStatus,
) -> Result<warp::reply::Response, Rejection> {
    let id = parse_id(&raw)?;
    let to: LeadStatus = body
        .status
        .parse()
        .map_err(|e: bridge_model::ModelError| reject(ApiError::BadRequest(e.to_string())))?;
    let lead = orchestrator
        .transition(id, to, actor, body.note)
        .await
        .map_err(reject)?;
    Ok(json_reply(&lead, StatusCode::OK))
}

async fn add_note(
    raw: String,
    orchestrator: Shared,
    actor: Actor,
    body: AddNote,
) -> Result<warp::reply::Response, Rejection> {
    let activity = orchestrator
        .add_note(parse_id(&raw)?, actor, &body.text)
        .await
        .map_err(reject)?;
    Ok(json_reply(&activity, StatusCode::CREATED))
}

async fn regenerate_document(
    raw: String,
    orchestrator: Shared,
    actor: Actor,
) -> Result<warp::reply::Response, Rejection> {
    let id = parse_id(&raw)?;
    tracing::info!(lead_id = %id, actor = %actor, "document regeneration requested");
    let outcome = orchestrator.regenerate_document(id).await.map_err(reject)?;
    let status = match outcome {
        DocumentOutcome::Stored(_) => StatusCode::OK,
        DocumentOutcome::Failed { .. } => StatusCode::BAD_GATEWAY,
        DocumentOutcome::Skipped => StatusCode::CONFLICT,
    };
    Ok(json_reply(&outcome, status))
}
