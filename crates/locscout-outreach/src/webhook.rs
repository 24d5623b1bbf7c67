//! Voice-provider webhook payloads.
//!
//! Only two message types carry candidate updates: `status-update` and
//! `end-of-call-report`. Every other type is acknowledged and ignored. The
//! candidate a call belongs to travels in `message.call.metadata.candidate_id`,
//! set when the call was placed.

use std::str::FromStr;

use locscout_core::{CallReport, LifecycleEvent, VapiCallStatus};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::OutreachError;

/// Header carrying the shared webhook secret.
pub const SECRET_HEADER: &str = "x-vapi-secret";

const STATUS_UPDATE: &str = "status-update";
const END_OF_CALL_REPORT: &str = "end-of-call-report";

/// A webhook reduced to what the candidate workflow needs.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    StatusUpdate {
        candidate_id: Uuid,
        call_id: Option<String>,
        status: VapiCallStatus,
    },
    EndOfCallReport {
        candidate_id: Uuid,
        report: Box<CallReport>,
    },
    /// Anything we do not act on: other message types and call statuses
    /// outside our vocabulary.
    Ignored { kind: String },
}

impl WebhookEvent {
    #[must_use]
    pub fn candidate_id(&self) -> Option<Uuid> {
        match self {
            Self::StatusUpdate { candidate_id, .. } | Self::EndOfCallReport { candidate_id, .. } => {
                Some(*candidate_id)
            }
            Self::Ignored { .. } => None,
        }
    }

    /// The lifecycle event to apply, or `None` for ignored webhooks.
    #[must_use]
    pub fn into_lifecycle(self) -> Option<(Uuid, LifecycleEvent)> {
        match self {
            Self::StatusUpdate {
                candidate_id,
                status: VapiCallStatus::Queued,
                call_id,
            } => Some((candidate_id, LifecycleEvent::CallQueued { call_id })),
            Self::StatusUpdate {
                candidate_id,
                status,
                ..
            } => Some((candidate_id, LifecycleEvent::CallStatus(status))),
            Self::EndOfCallReport {
                candidate_id,
                report,
            } => Some((candidate_id, LifecycleEvent::CallReport(report))),
            Self::Ignored { .. } => None,
        }
    }
}

/// Checks the shared secret when one is configured.
///
/// # Errors
///
/// [`OutreachError::Unauthorized`] when a secret is configured and the
/// provided one is absent or different.
pub fn verify_secret(expected: Option<&str>, provided: Option<&str>) -> Result<(), OutreachError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let provided = provided.ok_or(OutreachError::Unauthorized)?;
    if bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
        Ok(())
    } else {
        Err(OutreachError::Unauthorized)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    message: Message,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Message {
    #[serde(rename = "type", default)]
    kind: String,
    status: Option<String>,
    #[serde(default)]
    call: Call,
    #[serde(default)]
    analysis: Analysis,
    transcript: Option<String>,
    recording_url: Option<String>,
    duration_seconds: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Call {
    id: Option<String>,
    #[serde(default)]
    metadata: Metadata,
    duration: Option<f64>,
    recording_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    candidate_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Analysis {
    structured_data: Option<StructuredData>,
    summary: Option<String>,
    success_evaluation: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct StructuredData {
    venue_available: Option<bool>,
    availability_slots: Option<Value>,
    price_quoted: Option<Value>,
    price_unit: Option<String>,
    contact_name: Option<String>,
    contact_title: Option<String>,
    reservation_method: Option<String>,
    reservation_details: Option<String>,
    #[serde(default)]
    red_flags: Vec<String>,
}

/// Parses a raw webhook body.
///
/// # Errors
///
/// - [`OutreachError::InvalidPayload`] for bodies that are not a `{message}` object.
/// - [`OutreachError::MissingField`] / [`OutreachError::InvalidCandidateId`]
///   for actionable messages without a usable candidate id.
pub fn parse_webhook(body: &[u8]) -> Result<WebhookEvent, OutreachError> {
    let Envelope { message } = serde_json::from_slice(body)?;

    match message.kind.as_str() {
        STATUS_UPDATE => {
            let candidate_id = candidate_id(&message.call)?;
            let raw = message
                .status
                .as_deref()
                .ok_or(OutreachError::MissingField("message.status"))?;
            match VapiCallStatus::from_provider(raw) {
                Ok(status) => Ok(WebhookEvent::StatusUpdate {
                    candidate_id,
                    call_id: message.call.id,
                    status,
                }),
                Err(_) => {
                    tracing::warn!(%candidate_id, status = raw, "ignoring unknown call status");
                    Ok(WebhookEvent::Ignored {
                        kind: format!("{STATUS_UPDATE}:{raw}"),
                    })
                }
            }
        }
        END_OF_CALL_REPORT => {
            let candidate_id = candidate_id(&message.call)?;
            Ok(WebhookEvent::EndOfCallReport {
                candidate_id,
                report: Box::new(call_report(message)),
            })
        }
        other => {
            tracing::debug!(kind = other, "ignoring webhook");
            Ok(WebhookEvent::Ignored {
                kind: if other.is_empty() { "unknown" } else { other }.to_string(),
            })
        }
    }
}

fn candidate_id(call: &Call) -> Result<Uuid, OutreachError> {
    let raw = call
        .metadata
        .candidate_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(OutreachError::MissingField("message.call.metadata.candidate_id"))?;
    Uuid::parse_str(raw).map_err(|_| OutreachError::InvalidCandidateId(raw.to_string()))
}

fn call_report(message: Message) -> CallReport {
    let data = message.analysis.structured_data.unwrap_or_default();
    let reservation_method = non_empty(data.reservation_method);
    let reservation_details = non_empty(data.reservation_details);
    let manager_email = match reservation_method.as_deref() {
        Some(method) if method.eq_ignore_ascii_case("email") => reservation_details.clone(),
        _ => None,
    };

    CallReport {
        call_id: message.call.id,
        duration_seconds: message.call.duration.or(message.duration_seconds),
        recording_url: message.call.recording_url.or(message.recording_url),
        transcript: non_empty(message.transcript),
        venue_available: data.venue_available,
        availability_details: data.availability_slots.as_ref().and_then(availability),
        negotiated_price: data.price_quoted.as_ref().and_then(price),
        price_unit: non_empty(data.price_unit),
        manager_name: non_empty(data.contact_name),
        manager_title: non_empty(data.contact_title),
        manager_email,
        reservation_method,
        reservation_details,
        red_flags: data
            .red_flags
            .into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect(),
        summary: non_empty(message.analysis.summary),
        success_evaluation: message.analysis.success_evaluation.as_ref().and_then(text),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => non_empty(Some(s.clone())),
        other => Some(other.to_string()),
    }
}

/// Slots arrive as a list of strings or a single string.
fn availability(value: &Value) -> Option<String> {
    match value {
        Value::Array(slots) => {
            let slots: Vec<String> = slots.iter().filter_map(text).collect();
            (!slots.is_empty()).then(|| slots.join("; "))
        }
        other => text(other),
    }
}

/// Accepts numbers and strings such as `"$1,250.50"`.
fn price(value: &Value) -> Option<Decimal> {
    let raw = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s
            .trim()
            .trim_start_matches('$')
            .replace(',', "")
            .trim()
            .to_string(),
        _ => return None,
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .ok()
}

#[cfg(test)]
#[path = "webhook_test.rs"]
mod tests;
