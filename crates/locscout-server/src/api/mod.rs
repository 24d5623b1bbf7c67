mod candidates;
mod grounding;
mod scenes;
mod webhooks;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use locscout_db::DbError;
use locscout_grounding::GroundingPool;
use locscout_llm::TextCompletion;
use locscout_outreach::{CandidateWorkflow, OutreachError};
use locscout_scenes::{AnalysisOptions, DedupEngine};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::{request_id, require_bearer_auth, AuthState, RequestId};

#[derive(Clone)]
pub struct AppState {
    /// `None` when candidates live in memory.
    pub pool: Option<PgPool>,
    pub llm: Arc<dyn TextCompletion>,
    pub dedup: Arc<DedupEngine>,
    /// Per-request analysis options start from these.
    pub analysis: AnalysisOptions,
    pub grounding: Arc<GroundingPool>,
    pub workflow: CandidateWorkflow,
    pub webhook_secret: Option<Arc<str>>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn ok(request_id: String, data: T) -> Json<Self> {
        Json(Self {
            data,
            meta: ResponseMeta::new(request_id),
        })
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn map_outreach_error(request_id: String, error: &OutreachError) -> ApiError {
    match error {
        OutreachError::Db(DbError::NotFound(id)) => {
            ApiError::new(request_id, "not_found", format!("candidate {id} not found"))
        }
        OutreachError::Lifecycle(_) | OutreachError::Contended { .. } => {
            ApiError::new(request_id, "conflict", error.to_string())
        }
        OutreachError::Unauthorized => ApiError::new(request_id, "unauthorized", error.to_string()),
        OutreachError::InvalidPayload(_)
        | OutreachError::MissingField(_)
        | OutreachError::InvalidCandidateId(_)
        | OutreachError::Core(_) => ApiError::new(request_id, "bad_request", error.to_string()),
        OutreachError::Db(e) => {
            tracing::error!(error = %e, "candidate store failed");
            ApiError::new(request_id, "internal_error", "candidate store failed")
        }
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/scenes/dedup", post(scenes::dedup))
        .route("/api/v1/scenes/analyze", post(scenes::analyze))
        .route(
            "/api/v1/scenes/{scene_id}/candidates",
            get(candidates::list_for_scene),
        )
        .route("/api/v1/grounding/stream", post(grounding::stream))
        .route("/api/v1/candidates/{id}", get(candidates::get_candidate))
        .route("/api/v1/candidates/{id}/call", post(candidates::queue_call))
        .route("/api/v1/candidates/{id}/review", post(candidates::submit_for_review))
        .route("/api/v1/candidates/{id}/approve", post(candidates::approve))
        .route("/api/v1/candidates/{id}/reject", post(candidates::reject))
        .route("/api/v1/candidates/{id}/book", post(candidates::book))
        .layer(axum::middleware::from_fn_with_state(
            auth,
            require_bearer_auth,
        ))
}

pub fn build_app(state: AppState, auth: AuthState) -> Router {
    // The webhook authenticates with its own shared secret, not a bearer token.
    let public_routes = Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/webhooks/vapi", post(webhooks::vapi));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    let Some(pool) = &state.pool else {
        return (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "memory",
                },
                meta,
            }),
        );
    };

    match locscout_db::health_check(pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
