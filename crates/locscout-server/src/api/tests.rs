use super::*;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::Request;
use locscout_core::{
    lifecycle, GroundingResult, InteriorExterior, LocationCandidate, LocationRequirement,
    TimeOfDay, UniqueLocation,
};
use locscout_db::{CandidateRepository, MemoryCandidateRepository};
use locscout_grounding::{PoolOptions, SceneGrounder};
use locscout_llm::{CompletionRequest, LlmError};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

struct UnavailableLlm;

#[async_trait]
impl TextCompletion for UnavailableLlm {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, LlmError> {
        Err(LlmError::Status {
            status: 503,
            body: "offline".to_string(),
        })
    }
}

/// Returns two candidates for every requirement.
struct TwoVenues;

#[async_trait]
impl SceneGrounder for TwoVenues {
    async fn ground(&self, requirement: &LocationRequirement) -> GroundingResult {
        let mut result = GroundingResult::empty(requirement, "warehouse atlanta");
        result.candidates = ["Iron Works", "Dock 9"]
            .into_iter()
            .map(|name| {
                let mut c = LocationCandidate::new(
                    requirement.id,
                    requirement.project_id.clone(),
                    name,
                );
                c.phone_number = Some("+1 404 555 0100".to_string());
                lifecycle::initialize(&mut c);
                c
            })
            .collect();
        result.total_found = result.candidates.len();
        result
    }
}

struct Harness {
    app: Router,
    repo: Arc<MemoryCandidateRepository>,
}

fn harness_with(auth: AuthState, webhook_secret: Option<&str>) -> Harness {
    let llm: Arc<dyn TextCompletion> = Arc::new(UnavailableLlm);
    let repo = Arc::new(MemoryCandidateRepository::new());
    let state = AppState {
        pool: None,
        dedup: Arc::new(DedupEngine::new(Arc::clone(&llm))),
        analysis: AnalysisOptions::default(),
        llm,
        grounding: Arc::new(GroundingPool::new(
            Arc::new(TwoVenues),
            PoolOptions::default(),
        )),
        workflow: CandidateWorkflow::new(repo.clone()),
        webhook_secret: webhook_secret.map(Arc::from),
    };
    Harness {
        app: build_app(state, auth),
        repo,
    }
}

fn harness() -> Harness {
    harness_with(
        AuthState::from_keys("", true).expect("dev auth"),
        Some("hook-secret"),
    )
}

async fn seed(repo: &MemoryCandidateRepository, phone: Option<&str>) -> LocationCandidate {
    let mut c = LocationCandidate::new(Uuid::new_v4(), "proj-1", "Iron Works");
    c.phone_number = phone.map(ToString::to_string);
    lifecycle::initialize(&mut c);
    repo.create_many(std::slice::from_ref(&c))
        .await
        .expect("seed candidate");
    c
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

fn webhook(candidate_id: &str, status: &str, secret: &str) -> Request<Body> {
    let body = json!({
        "message": {
            "type": "status-update",
            "status": status,
            "call": {"id": "call-1", "metadata": {"candidate_id": candidate_id}}
        }
    });
    Request::builder()
        .method("POST")
        .uri("/api/webhooks/vapi")
        .header("content-type", "application/json")
        .header("x-vapi-secret", secret)
        .body(Body::from(body.to_string()))
        .expect("request")
}

#[test]
fn api_error_validation_error_maps_to_bad_request() {
    let response = ApiError::new("req-1", "validation_error", "invalid input").into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[test]
fn api_error_unknown_code_maps_to_internal_error() {
    let response = ApiError::new("req-1", "mystery", "boom").into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn health_reports_memory_store_without_database() {
    let h = harness();
    let (status, body) = send(&h.app, get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["database"], "memory");
    assert!(body["meta"]["request_id"].as_str().is_some());
}

#[tokio::test]
async fn protected_routes_require_bearer_token_when_keys_are_set() {
    let h = harness_with(AuthState::from_keys("k1", false).expect("auth"), None);
    let c = seed(&h.repo, None).await;
    let uri = format!("/api/v1/candidates/{}", c.id);

    let (status, _) = send(&h.app, get(&uri)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri(&uri)
        .header("authorization", "Bearer k1")
        .body(Body::empty())
        .expect("request");
    let (status, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["venue_name"], "Iron Works");

    // Health stays public.
    let (status, _) = send(&h.app, get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_candidate_is_not_found() {
    let h = harness();
    let (status, body) = send(
        &h.app,
        get(&format!("/api/v1/candidates/{}", Uuid::new_v4())),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn approving_before_review_is_a_conflict() {
    let h = harness();
    let c = seed(&h.repo, Some("+1 404 555 0100")).await;
    let (status, body) = send(
        &h.app,
        post_json(
            &format!("/api/v1/candidates/{}/approve", c.id),
            &json!({"approved_by": "ana"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");
}

#[tokio::test]
async fn booking_requires_a_booking_id() {
    let h = harness();
    let c = seed(&h.repo, Some("+1 404 555 0100")).await;
    let (status, body) = send(
        &h.app,
        post_json(
            &format!("/api/v1/candidates/{}/book", c.id),
            &json!({"booking_id": "  "}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");
}

#[tokio::test]
async fn call_queue_and_webhook_update_the_candidate() {
    let h = harness();
    let c = seed(&h.repo, Some("+1 404 555 0100")).await;

    let (status, body) = send(
        &h.app,
        post_json(
            &format!("/api/v1/candidates/{}/call", c.id),
            &json!({"call_id": "call-1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["changed"], true);
    assert_eq!(body["data"]["candidate"]["status"], "call_pending");

    let (status, body) = send(&h.app, webhook(&c.id.to_string(), "ringing", "hook-secret")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["kind"], "status-update");
    assert_eq!(body["data"]["updated"], true);
    assert_eq!(body["data"]["status"], "call_in_progress");

    // Replays are acknowledged without a write.
    let (status, body) = send(&h.app, webhook(&c.id.to_string(), "ringing", "hook-secret")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["updated"], false);
}

#[tokio::test]
async fn webhook_with_wrong_secret_is_rejected() {
    let h = harness();
    let c = seed(&h.repo, Some("+1 404 555 0100")).await;
    let (status, body) = send(&h.app, webhook(&c.id.to_string(), "ringing", "nope")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");

    let stored = h.repo.get(c.id).await.expect("stored");
    assert_eq!(stored.version, 1);
}

#[tokio::test]
async fn webhook_without_candidate_id_is_acknowledged() {
    let h = harness();
    let (status, body) = send(&h.app, webhook("not-a-uuid", "ringing", "hook-secret")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["kind"], "unroutable");
    assert_eq!(body["data"]["updated"], false);
}

#[tokio::test]
async fn webhook_for_unknown_candidate_is_not_found() {
    let h = harness();
    let (status, _) = send(
        &h.app,
        webhook(&Uuid::new_v4().to_string(), "ringing", "hook-secret"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dedup_survives_an_unavailable_model() {
    let h = harness();
    let locations = vec![
        UniqueLocation::single(
            "INT. WAREHOUSE - NIGHT",
            InteriorExterior::Interior,
            TimeOfDay::Night,
            3,
            "Rain on the tin roof.",
        ),
        UniqueLocation::single(
            "INT. WAREHOUSE - DAY",
            InteriorExterior::Interior,
            TimeOfDay::Day,
            9,
            "Dust in the light.",
        ),
    ];
    let (status, body) = send(
        &h.app,
        post_json("/api/v1/scenes/dedup", &json!({ "locations": locations })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["report"]["input_count"], 2);
    assert!(body["data"]["locations"].as_array().is_some_and(|l| !l.is_empty()));
}

#[tokio::test]
async fn analyze_validates_request() {
    let h = harness();
    let (status, body) = send(
        &h.app,
        post_json(
            "/api/v1/scenes/analyze",
            &json!({"project_id": " ", "locations": []}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");

    let (status, _) = send(
        &h.app,
        post_json(
            "/api/v1/scenes/analyze",
            &json!({"project_id": "proj-1", "max_results": 0, "locations": []}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn grounding_stream_rejects_zero_concurrency() {
    let h = harness();
    let (status, body) = send(
        &h.app,
        post_json(
            "/api/v1/grounding/stream",
            &json!({"requirements": [], "max_concurrent": 0}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");
}

#[tokio::test]
async fn grounding_stream_emits_events_and_stores_candidates() {
    let h = harness();
    let requirement: LocationRequirement = serde_json::from_value(json!({
        "project_id": "proj-1",
        "scene_header": "INT. WAREHOUSE - NIGHT",
        "vibe": {"primary": "industrial", "descriptors": ["rusty"]},
        "constraints": {"interior_exterior": "interior", "time_of_day": "night"},
        "target_city": "Atlanta, GA",
        "max_results": 3
    }))
    .expect("requirement");
    let scene_id = requirement.id;

    let response = h
        .app
        .clone()
        .oneshot(post_json(
            "/api/v1/grounding/stream",
            &json!({ "requirements": [requirement] }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("text/event-stream")
    );

    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let text = String::from_utf8(bytes.to_vec()).expect("utf8");
    assert!(text.contains("event: scene_start"), "{text}");
    assert!(text.contains("event: candidate"), "{text}");
    assert!(text.contains("event: scene_complete"), "{text}");
    assert!(text.contains("event: complete"), "{text}");

    let (status, body) = send(
        &h.app,
        get(&format!("/api/v1/scenes/{scene_id}/candidates")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["data"]
        .as_array()
        .expect("list")
        .iter()
        .filter_map(|c| c["venue_name"].as_str())
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"Iron Works"));
    assert!(names.contains(&"Dock 9"));
}
