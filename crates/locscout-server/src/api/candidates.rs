use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use locscout_db::StoredCandidate;
use locscout_outreach::{OutreachError, WorkflowOutcome};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{map_outreach_error, ApiError, ApiResponse, AppState};
use crate::middleware::RequestId;

#[derive(Debug, Serialize)]
pub(super) struct TransitionItem {
    candidate: StoredCandidate,
    changed: bool,
}

impl From<WorkflowOutcome> for TransitionItem {
    fn from(outcome: WorkflowOutcome) -> Self {
        Self {
            changed: outcome.changed(),
            candidate: outcome.candidate,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct QueueCallBody {
    call_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct ApproveBody {
    approved_by: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RejectBody {
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct BookBody {
    booking_id: String,
}

type Outcome = Result<Json<ApiResponse<TransitionItem>>, ApiError>;

fn respond(req_id: RequestId, result: Result<WorkflowOutcome, OutreachError>) -> Outcome {
    match result {
        Ok(outcome) => Ok(ApiResponse::ok(req_id.0, TransitionItem::from(outcome))),
        Err(e) => Err(map_outreach_error(req_id.0, &e)),
    }
}

pub(super) async fn get_candidate(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    match state.workflow.get(id).await {
        Ok(stored) => Ok(ApiResponse::ok(req_id.0, stored)),
        Err(e) => Err(map_outreach_error(req_id.0, &e)),
    }
}

pub(super) async fn list_for_scene(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(scene_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    match state.workflow.list_for_scene(scene_id).await {
        Ok(candidates) => Ok(ApiResponse::ok(req_id.0, candidates)),
        Err(e) => Err(map_outreach_error(req_id.0, &e)),
    }
}

pub(super) async fn queue_call(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
    body: Option<Json<QueueCallBody>>,
) -> Outcome {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    respond(req_id, state.workflow.queue_call(id, body.call_id).await)
}

pub(super) async fn submit_for_review(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Outcome {
    respond(req_id, state.workflow.submit_for_review(id).await)
}

pub(super) async fn approve(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
    body: Option<Json<ApproveBody>>,
) -> Outcome {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    respond(req_id, state.workflow.approve(id, body.approved_by).await)
}

pub(super) async fn reject(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
    body: Option<Json<RejectBody>>,
) -> Outcome {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    respond(req_id, state.workflow.reject(id, body.reason).await)
}

pub(super) async fn book(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
    Json(body): Json<BookBody>,
) -> Outcome {
    let booking_id = body.booking_id.trim();
    if booking_id.is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "booking_id must not be empty",
        ));
    }
    respond(req_id, state.workflow.book(id, booking_id).await)
}
