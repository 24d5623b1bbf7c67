use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    Extension,
};
use locscout_outreach::{parse_webhook, verify_secret, OutreachError, WebhookAck, SECRET_HEADER};

use super::{map_outreach_error, ApiError, ApiResponse, AppState};
use crate::middleware::RequestId;

/// Receives call status updates and end-of-call reports from the voice
/// provider. Webhooks without a usable candidate id are acknowledged with
/// `updated: false` so the provider does not retry them.
pub(super) async fn vapi(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
    if let Err(e) = verify_secret(state.webhook_secret.as_deref(), provided) {
        tracing::warn!(request_id = %req_id.0, "rejected webhook with bad secret");
        return Err(map_outreach_error(req_id.0, &e));
    }

    let webhook = match parse_webhook(&body) {
        Ok(webhook) => webhook,
        Err(e @ (OutreachError::MissingField(_) | OutreachError::InvalidCandidateId(_))) => {
            tracing::warn!(request_id = %req_id.0, error = %e, "webhook without usable candidate id");
            return Ok(ApiResponse::ok(
                req_id.0,
                WebhookAck {
                    kind: "unroutable".to_string(),
                    updated: false,
                    candidate_id: None,
                    status: None,
                },
            ));
        }
        Err(e) => return Err(map_outreach_error(req_id.0, &e)),
    };

    match state.workflow.handle_webhook(webhook).await {
        Ok(ack) => {
            tracing::info!(
                kind = %ack.kind,
                updated = ack.updated,
                candidate = ?ack.candidate_id,
                "webhook processed"
            );
            Ok(ApiResponse::ok(req_id.0, ack))
        }
        Err(e) => {
            tracing::warn!(request_id = %req_id.0, error = %e, "webhook could not be applied");
            Err(map_outreach_error(req_id.0, &e))
        }
    }
}
