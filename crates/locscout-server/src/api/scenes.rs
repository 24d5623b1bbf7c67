use axum::{extract::State, response::IntoResponse, Extension, Json};
use locscout_core::UniqueLocation;
use locscout_scenes::RequirementAnalyzer;
use serde::Deserialize;

use super::{ApiError, ApiResponse, AppState};
use crate::middleware::RequestId;

#[derive(Debug, Deserialize)]
pub(super) struct DedupRequest {
    locations: Vec<UniqueLocation>,
}

#[derive(Debug, Deserialize)]
pub(super) struct AnalyzeRequest {
    project_id: String,
    target_city: Option<String>,
    max_results: Option<usize>,
    locations: Vec<UniqueLocation>,
}

pub(super) async fn dedup(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<DedupRequest>,
) -> impl IntoResponse {
    let outcome = state.dedup.run(body.locations).await;
    tracing::info!(
        input = outcome.report.input_count,
        output = outcome.locations.len(),
        "dedup complete"
    );
    ApiResponse::ok(req_id.0, outcome)
}

pub(super) async fn analyze(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<AnalyzeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let project_id = body.project_id.trim();
    if project_id.is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "project_id must not be empty",
        ));
    }
    if body.max_results == Some(0) {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "max_results must be at least 1",
        ));
    }

    let mut options = state.analysis.clone();
    options.project_id = project_id.to_string();
    if let Some(city) = body.target_city.filter(|c| !c.trim().is_empty()) {
        options.target_city = city;
    }
    if let Some(max_results) = body.max_results {
        options.max_results = max_results;
    }

    let analyzer = RequirementAnalyzer::new(state.llm.clone(), options);
    let batch = analyzer.analyze_all(&body.locations).await;
    tracing::info!(
        analyzed = batch.requirements.len(),
        failed = batch.failures.len(),
        "requirement analysis complete"
    );
    Ok(ApiResponse::ok(req_id.0, batch))
}
