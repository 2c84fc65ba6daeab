use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{
    AbsenceSlot, Actor, ActorRole, RequestId, RequestView, ResponseAction, ScheduledClass,
    TeacherId, TimeSlot,
};
use super::recommend::Recommendation;
use super::repository::{NotifierGateway, RequestRepository};
use super::roster::RosterStore;
use super::service::{SubstitutionError, SubstitutionService};

/// Routes for the substitution workflow, to be merged into the application
/// router. Handlers stay thin: parse, call the service, map the error.
pub fn substitution_router<R, S, N>(service: Arc<SubstitutionService<R, S, N>>) -> Router
where
    R: RosterStore + 'static,
    S: RequestRepository + 'static,
    N: NotifierGateway + 'static,
{
    Router::new()
        .route("/api/v1/substitutions", post(create_endpoint))
        .route("/api/v1/substitutions/:id", get(get_endpoint))
        .route("/api/v1/substitutions/:id/approve", post(approve_endpoint))
        .route("/api/v1/substitutions/:id/reject", post(reject_endpoint))
        .route("/api/v1/substitutions/:id/cancel", post(cancel_endpoint))
        .route("/api/v1/substitutions/:id/respond", post(respond_endpoint))
        .route(
            "/api/v1/departments/:department/substitutions/pending",
            get(pending_endpoint),
        )
        .route("/api/v1/substitutes/recommend", get(recommend_endpoint))
        .route("/api/v1/teachers/:id/schedule", get(schedule_endpoint))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
struct CreateRequest {
    requester: u32,
    #[serde(deserialize_with = "deserialize_date")]
    date: NaiveDate,
    #[serde(deserialize_with = "deserialize_time")]
    start_time: NaiveTime,
    #[serde(deserialize_with = "deserialize_time")]
    end_time: NaiveTime,
    subject: String,
    reason: String,
    #[serde(default)]
    message: Option<String>,
    candidates: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct ActorRequest {
    actor_id: u32,
    role: ActorRole,
    department: String,
}

impl ActorRequest {
    fn into_actor(self) -> Actor {
        Actor {
            id: TeacherId(self.actor_id),
            role: self.role,
            department: self.department,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RespondRequest {
    teacher_id: u32,
    action: ResponseAction,
}

#[derive(Debug, Deserialize)]
struct RecommendQuery {
    requester: u32,
    #[serde(deserialize_with = "deserialize_date")]
    date: NaiveDate,
    #[serde(deserialize_with = "deserialize_time")]
    start_time: NaiveTime,
    #[serde(deserialize_with = "deserialize_time")]
    end_time: NaiveTime,
    subject: String,
}

#[derive(Debug, Deserialize)]
struct ScheduleQuery {
    #[serde(deserialize_with = "deserialize_date")]
    week_start: NaiveDate,
}

struct ApiError(SubstitutionError);

impl From<SubstitutionError> for ApiError {
    fn from(value: SubstitutionError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            SubstitutionError::Validation(_) | SubstitutionError::InvalidState(_) => {
                StatusCode::BAD_REQUEST
            }
            SubstitutionError::Permission(_) => StatusCode::FORBIDDEN,
            SubstitutionError::RequestNotFound | SubstitutionError::TeacherNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            SubstitutionError::Repository(_) | SubstitutionError::Roster(_) => {
                error!(error = %self.0, "substitution backend failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

async fn create_endpoint<R, S, N>(
    State(service): State<Arc<SubstitutionService<R, S, N>>>,
    Json(payload): Json<CreateRequest>,
) -> Result<(StatusCode, Json<RequestView>), ApiError>
where
    R: RosterStore + 'static,
    S: RequestRepository + 'static,
    N: NotifierGateway + 'static,
{
    let candidates: Vec<TeacherId> = payload.candidates.iter().copied().map(TeacherId).collect();
    let absence = AbsenceSlot {
        date: payload.date,
        slot: TimeSlot {
            start: payload.start_time,
            end: payload.end_time,
        },
        subject: payload.subject,
    };
    let request = service.create(
        TeacherId(payload.requester),
        absence,
        payload.reason,
        payload.message,
        &candidates,
        now(),
    )?;
    Ok((StatusCode::CREATED, Json(request.view())))
}

async fn get_endpoint<R, S, N>(
    State(service): State<Arc<SubstitutionService<R, S, N>>>,
    Path(id): Path<String>,
) -> Result<Json<RequestView>, ApiError>
where
    R: RosterStore + 'static,
    S: RequestRepository + 'static,
    N: NotifierGateway + 'static,
{
    let request = service.get(&RequestId(id), now())?;
    Ok(Json(request.view()))
}

async fn approve_endpoint<R, S, N>(
    State(service): State<Arc<SubstitutionService<R, S, N>>>,
    Path(id): Path<String>,
    Json(payload): Json<ActorRequest>,
) -> Result<Json<RequestView>, ApiError>
where
    R: RosterStore + 'static,
    S: RequestRepository + 'static,
    N: NotifierGateway + 'static,
{
    let request = service.approve(&RequestId(id), &payload.into_actor(), now())?;
    Ok(Json(request.view()))
}

async fn reject_endpoint<R, S, N>(
    State(service): State<Arc<SubstitutionService<R, S, N>>>,
    Path(id): Path<String>,
    Json(payload): Json<ActorRequest>,
) -> Result<Json<RequestView>, ApiError>
where
    R: RosterStore + 'static,
    S: RequestRepository + 'static,
    N: NotifierGateway + 'static,
{
    let request = service.reject(&RequestId(id), &payload.into_actor(), now())?;
    Ok(Json(request.view()))
}

async fn cancel_endpoint<R, S, N>(
    State(service): State<Arc<SubstitutionService<R, S, N>>>,
    Path(id): Path<String>,
    Json(payload): Json<ActorRequest>,
) -> Result<Json<RequestView>, ApiError>
where
    R: RosterStore + 'static,
    S: RequestRepository + 'static,
    N: NotifierGateway + 'static,
{
    let request = service.cancel(&RequestId(id), &payload.into_actor(), now())?;
    Ok(Json(request.view()))
}

async fn respond_endpoint<R, S, N>(
    State(service): State<Arc<SubstitutionService<R, S, N>>>,
    Path(id): Path<String>,
    Json(payload): Json<RespondRequest>,
) -> Result<Json<RequestView>, ApiError>
where
    R: RosterStore + 'static,
    S: RequestRepository + 'static,
    N: NotifierGateway + 'static,
{
    let request = service.respond(
        &RequestId(id),
        TeacherId(payload.teacher_id),
        payload.action,
        now(),
    )?;
    Ok(Json(request.view()))
}

async fn pending_endpoint<R, S, N>(
    State(service): State<Arc<SubstitutionService<R, S, N>>>,
    Path(department): Path<String>,
) -> Result<Json<Vec<RequestView>>, ApiError>
where
    R: RosterStore + 'static,
    S: RequestRepository + 'static,
    N: NotifierGateway + 'static,
{
    let pending = service.pending_for_department(&department)?;
    Ok(Json(pending.iter().map(|request| request.view()).collect()))
}

async fn recommend_endpoint<R, S, N>(
    State(service): State<Arc<SubstitutionService<R, S, N>>>,
    Query(query): Query<RecommendQuery>,
) -> Result<Json<Vec<Recommendation>>, ApiError>
where
    R: RosterStore + 'static,
    S: RequestRepository + 'static,
    N: NotifierGateway + 'static,
{
    let absence = AbsenceSlot {
        date: query.date,
        slot: TimeSlot {
            start: query.start_time,
            end: query.end_time,
        },
        subject: query.subject,
    };
    let ranked = service.recommend(TeacherId(query.requester), &absence)?;
    Ok(Json(ranked))
}

async fn schedule_endpoint<R, S, N>(
    State(service): State<Arc<SubstitutionService<R, S, N>>>,
    Path(id): Path<u32>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<Vec<ScheduledClass>>, ApiError>
where
    R: RosterStore + 'static,
    S: RequestRepository + 'static,
    N: NotifierGateway + 'static,
{
    let classes = service.weekly_schedule(TeacherId(id), query.week_start)?;
    Ok(Json(classes))
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    let trimmed = raw.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|err| format!("failed to parse '{raw}' as HH:MM ({err})"))
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).map_err(serde::de::Error::custom)
}

fn deserialize_time<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_time(&raw).map_err(serde::de::Error::custom)
}
