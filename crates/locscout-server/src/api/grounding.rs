//! Grounding runs streamed as server-sent events.
//!
//! Each [`GroundingEvent`] becomes one SSE event named after its `type`.
//! Candidates are stored as each scene completes, so they can be reviewed
//! while the rest of the run is still going. Closing the connection drops the
//! run, which cancels the outstanding scenes.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Extension, Json,
};
use futures::StreamExt;
use locscout_core::LocationRequirement;
use locscout_grounding::GroundingEvent;
use locscout_outreach::CandidateWorkflow;
use serde::Deserialize;

use super::{ApiError, AppState};
use crate::middleware::RequestId;

const KEEP_ALIVE_SECS: u64 = 15;

#[derive(Debug, Deserialize)]
pub(super) struct GroundingRequest {
    requirements: Vec<LocationRequirement>,
    max_concurrent: Option<usize>,
}

pub(super) async fn stream(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<GroundingRequest>,
) -> Response {
    if body.max_concurrent == Some(0) {
        return ApiError::new(
            req_id.0,
            "validation_error",
            "max_concurrent must be at least 1",
        )
        .into_response();
    }

    let bound = body
        .max_concurrent
        .unwrap_or(state.grounding.options().max_concurrent);
    tracing::info!(
        request_id = %req_id.0,
        requirements = body.requirements.len(),
        bound,
        "starting grounding stream"
    );

    let run = state.grounding.process_with_bound(body.requirements, bound);
    let workflow = state.workflow.clone();
    let events = run.into_stream().then(move |event| {
        let workflow = workflow.clone();
        async move {
            persist(&workflow, &event).await;
            Ok::<_, Infallible>(to_sse(&event))
        }
    });

    Sse::new(events)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(KEEP_ALIVE_SECS))
                .text("heartbeat"),
        )
        .into_response()
}

async fn persist(workflow: &CandidateWorkflow, event: &GroundingEvent) {
    let GroundingEvent::SceneComplete { result, .. } = event else {
        return;
    };
    if result.candidates.is_empty() {
        return;
    }
    match workflow.store(&result.candidates).await {
        Ok(stored) => {
            tracing::debug!(scene = %result.scene_header, stored, "stored grounded candidates");
        }
        Err(e) => {
            tracing::error!(scene = %result.scene_header, error = %e, "failed to store candidates");
        }
    }
}

fn to_sse(event: &GroundingEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(json) => Event::default().event(event.name()).data(json),
        Err(e) => {
            tracing::warn!(event = event.name(), error = %e, "failed to serialize grounding event");
            Event::default().comment("serialization failed")
        }
    }
}
