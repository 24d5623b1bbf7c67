//! Candidate workflow state machine.
//!
//! ```text
//! discovered ─► call_pending ─► call_in_progress ─► call_completed ─┐
//!      │                                        └─► call_failed ────┤
//!      └──(no phone)──────────────────────────────────────────────► human_review ─► approved ─► booked
//!                                                                                 └► rejected
//! ```
//!
//! [`plan`] is pure: it inspects a candidate and an event and returns the
//! [`CandidatePatch`] to apply, or `None` when the event is a replay or arrives
//! after the candidate has already moved past the state the event concerns.
//! Storage layers apply the patch atomically per record.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::candidate::{CandidateStatus, LocationCandidate, VapiCallStatus, NO_PHONE_RED_FLAG};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("candidate has no phone number; call events are not accepted")]
    NoPhoneNumber,
    #[error("cannot apply {event} to a candidate in {from}")]
    InvalidTransition {
        from: CandidateStatus,
        event: &'static str,
    },
}

/// Structured outcome of a completed outreach call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallReport {
    pub call_id: Option<String>,
    pub duration_seconds: Option<f64>,
    pub recording_url: Option<String>,
    pub transcript: Option<String>,
    pub venue_available: Option<bool>,
    pub availability_details: Option<String>,
    pub negotiated_price: Option<Decimal>,
    pub price_unit: Option<String>,
    pub manager_name: Option<String>,
    pub manager_title: Option<String>,
    pub manager_email: Option<String>,
    pub reservation_method: Option<String>,
    pub reservation_details: Option<String>,
    #[serde(default)]
    pub red_flags: Vec<String>,
    pub summary: Option<String>,
    pub success_evaluation: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    CallQueued { call_id: Option<String> },
    CallStatus(VapiCallStatus),
    CallReport(Box<CallReport>),
    SubmitForReview,
    Approve { approved_by: Option<String> },
    Reject { reason: Option<String> },
    Book { booking_id: String },
}

impl LifecycleEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::CallQueued { .. } => "call_queued",
            Self::CallStatus(_) => "call_status",
            Self::CallReport(_) => "call_report",
            Self::SubmitForReview => "submit_for_review",
            Self::Approve { .. } => "approve",
            Self::Reject { .. } => "reject",
            Self::Book { .. } => "book",
        }
    }

    fn is_call_event(&self) -> bool {
        matches!(
            self,
            Self::CallQueued { .. } | Self::CallStatus(_) | Self::CallReport(_)
        )
    }
}

/// Partial update to a candidate. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidatePatch {
    pub status: Option<CandidateStatus>,
    pub vapi_call_status: Option<VapiCallStatus>,
    pub vapi_call_id: Option<String>,
    pub vapi_call_initiated_at: Option<DateTime<Utc>>,
    pub vapi_call_completed_at: Option<DateTime<Utc>>,
    pub report: Option<CallReport>,
    pub report_received_at: Option<DateTime<Utc>>,
    pub append_red_flags: Vec<String>,
    pub rejection_reason: Option<String>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub booking_id: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

fn set_if_some<T: Clone>(target: &mut Option<T>, value: Option<&T>) {
    if let Some(v) = value {
        *target = Some(v.clone());
    }
}

impl CandidatePatch {
    fn at(now: DateTime<Utc>) -> Self {
        Self {
            updated_at: Some(now),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Applies every set field to `candidate`. Red flags are appended, never replaced.
    pub fn apply(&self, candidate: &mut LocationCandidate) {
        if let Some(status) = self.status {
            candidate.status = status;
        }
        if let Some(call_status) = self.vapi_call_status {
            candidate.vapi_call_status = call_status;
        }
        set_if_some(&mut candidate.vapi_call_id, self.vapi_call_id.as_ref());
        set_if_some(
            &mut candidate.vapi_call_initiated_at,
            self.vapi_call_initiated_at.as_ref(),
        );
        set_if_some(
            &mut candidate.vapi_call_completed_at,
            self.vapi_call_completed_at.as_ref(),
        );
        if let Some(report) = &self.report {
            set_if_some(&mut candidate.vapi_call_id, report.call_id.as_ref());
            set_if_some(
                &mut candidate.vapi_call_duration_seconds,
                report.duration_seconds.as_ref(),
            );
            set_if_some(&mut candidate.vapi_recording_url, report.recording_url.as_ref());
            set_if_some(&mut candidate.vapi_transcript, report.transcript.as_ref());
            set_if_some(&mut candidate.venue_available, report.venue_available.as_ref());
            set_if_some(
                &mut candidate.availability_details,
                report.availability_details.as_ref(),
            );
            set_if_some(&mut candidate.negotiated_price, report.negotiated_price.as_ref());
            set_if_some(&mut candidate.price_unit, report.price_unit.as_ref());
            set_if_some(&mut candidate.manager_name, report.manager_name.as_ref());
            set_if_some(&mut candidate.manager_title, report.manager_title.as_ref());
            set_if_some(&mut candidate.manager_email, report.manager_email.as_ref());
            set_if_some(
                &mut candidate.reservation_method,
                report.reservation_method.as_ref(),
            );
            set_if_some(
                &mut candidate.reservation_details,
                report.reservation_details.as_ref(),
            );
            set_if_some(&mut candidate.call_summary, report.summary.as_ref());
            set_if_some(
                &mut candidate.call_success_evaluation,
                report.success_evaluation.as_ref(),
            );
            for flag in &report.red_flags {
                candidate.add_red_flag(flag.clone());
            }
        }
        set_if_some(
            &mut candidate.call_report_received_at,
            self.report_received_at.as_ref(),
        );
        for flag in &self.append_red_flags {
            candidate.add_red_flag(flag.clone());
        }
        set_if_some(&mut candidate.rejection_reason, self.rejection_reason.as_ref());
        set_if_some(&mut candidate.approved_by, self.approved_by.as_ref());
        set_if_some(&mut candidate.approved_at, self.approved_at.as_ref());
        set_if_some(&mut candidate.booking_id, self.booking_id.as_ref());
        if let Some(updated_at) = self.updated_at {
            candidate.updated_at = updated_at;
        }
    }
}

/// Whether applying an event changed the candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Moved {
        from: CandidateStatus,
        to: CandidateStatus,
    },
    Updated(CandidateStatus),
    Unchanged(CandidateStatus),
}

/// Puts a freshly discovered candidate into its starting state.
///
/// Candidates without a phone number go straight to `human_review` with a
/// standing red flag and call status `no_phone_number`.
pub fn initialize(candidate: &mut LocationCandidate) {
    if candidate.has_phone() {
        candidate.status = CandidateStatus::Discovered;
        candidate.vapi_call_status = VapiCallStatus::NotInitiated;
    } else {
        candidate.status = CandidateStatus::HumanReview;
        candidate.vapi_call_status = VapiCallStatus::NoPhoneNumber;
        candidate.add_red_flag(NO_PHONE_RED_FLAG);
    }
}

fn invalid(from: CandidateStatus, event: &LifecycleEvent) -> LifecycleError {
    LifecycleError::InvalidTransition {
        from,
        event: event.name(),
    }
}

/// Computes the patch an event would apply to `candidate`.
///
/// # Errors
///
/// - [`LifecycleError::NoPhoneNumber`] for call events on a candidate without a phone.
/// - [`LifecycleError::InvalidTransition`] for human actions the current state forbids.
#[allow(clippy::too_many_lines)]
pub fn plan(
    candidate: &LocationCandidate,
    event: &LifecycleEvent,
    now: DateTime<Utc>,
) -> Result<Option<CandidatePatch>, LifecycleError> {
    use CandidateStatus as S;

    if event.is_call_event() && !candidate.has_phone() {
        return Err(LifecycleError::NoPhoneNumber);
    }

    let status = candidate.status;
    let patch = match event {
        LifecycleEvent::CallQueued { call_id } => match status {
            S::Discovered => Some(CandidatePatch {
                status: Some(S::CallPending),
                vapi_call_status: Some(VapiCallStatus::Queued),
                vapi_call_id: call_id.clone(),
                vapi_call_initiated_at: Some(now),
                ..CandidatePatch::at(now)
            }),
            // Late or replayed: the call already moved on.
            _ => None,
        },

        LifecycleEvent::CallStatus(call_status) => plan_call_status(candidate, *call_status, now)
            .map_err(|()| invalid(status, event))?,

        LifecycleEvent::CallReport(report) => match status {
            S::Discovered | S::CallPending | S::CallInProgress => Some(CandidatePatch {
                status: Some(S::CallCompleted),
                vapi_call_status: Some(VapiCallStatus::Completed),
                vapi_call_completed_at: Some(now),
                report: Some((**report).clone()),
                report_received_at: Some(now),
                ..CandidatePatch::at(now)
            }),
            // A report after a status-only "ended" or a failed outcome still
            // carries data worth keeping, but only once.
            S::CallCompleted | S::CallFailed if candidate.call_report_received_at.is_none() => {
                Some(CandidatePatch {
                    vapi_call_completed_at: candidate.vapi_call_completed_at.or(Some(now)),
                    report: Some((**report).clone()),
                    report_received_at: Some(now),
                    ..CandidatePatch::at(now)
                })
            }
            _ => None,
        },

        LifecycleEvent::SubmitForReview => match status {
            S::CallCompleted | S::CallFailed => Some(CandidatePatch {
                status: Some(S::HumanReview),
                ..CandidatePatch::at(now)
            }),
            S::Discovered if !candidate.has_phone() => Some(CandidatePatch {
                status: Some(S::HumanReview),
                vapi_call_status: Some(VapiCallStatus::NoPhoneNumber),
                append_red_flags: vec![NO_PHONE_RED_FLAG.to_string()],
                ..CandidatePatch::at(now)
            }),
            S::HumanReview => None,
            _ => return Err(invalid(status, event)),
        },

        LifecycleEvent::Approve { approved_by } => match status {
            S::HumanReview | S::CallCompleted => Some(CandidatePatch {
                status: Some(S::Approved),
                approved_by: approved_by.clone(),
                approved_at: Some(now),
                ..CandidatePatch::at(now)
            }),
            S::Approved | S::Booked => None,
            _ => return Err(invalid(status, event)),
        },

        LifecycleEvent::Reject { reason } => match status {
            S::HumanReview | S::CallCompleted => Some(CandidatePatch {
                status: Some(S::Rejected),
                rejection_reason: reason.clone(),
                ..CandidatePatch::at(now)
            }),
            S::Rejected => None,
            _ => return Err(invalid(status, event)),
        },

        LifecycleEvent::Book { booking_id } => match status {
            S::Approved => Some(CandidatePatch {
                status: Some(S::Booked),
                booking_id: Some(booking_id.clone()),
                ..CandidatePatch::at(now)
            }),
            S::Booked if candidate.booking_id.as_deref() == Some(booking_id.as_str()) => None,
            _ => return Err(invalid(status, event)),
        },
    };

    Ok(patch)
}

/// Status updates never regress a candidate that has moved past the call
/// branch; those arrive late and are dropped.
fn plan_call_status(
    candidate: &LocationCandidate,
    call_status: VapiCallStatus,
    now: DateTime<Utc>,
) -> Result<Option<CandidatePatch>, ()> {
    use CandidateStatus as S;

    let status = candidate.status;
    let unchanged = candidate.vapi_call_status == call_status;

    let patch = match call_status {
        VapiCallStatus::NotInitiated | VapiCallStatus::NoPhoneNumber => return Err(()),

        VapiCallStatus::Queued => match status {
            S::Discovered => Some(CandidatePatch {
                status: Some(S::CallPending),
                vapi_call_status: Some(call_status),
                vapi_call_initiated_at: Some(now),
                ..CandidatePatch::at(now)
            }),
            _ => None,
        },

        VapiCallStatus::Ringing | VapiCallStatus::InProgress => match status {
            S::Discovered | S::CallPending => Some(CandidatePatch {
                status: Some(S::CallInProgress),
                vapi_call_status: Some(call_status),
                vapi_call_initiated_at: candidate.vapi_call_initiated_at.or(Some(now)),
                ..CandidatePatch::at(now)
            }),
            S::CallInProgress if !unchanged => Some(CandidatePatch {
                vapi_call_status: Some(call_status),
                ..CandidatePatch::at(now)
            }),
            _ => None,
        },

        VapiCallStatus::Completed => match status {
            S::Discovered | S::CallPending | S::CallInProgress => Some(CandidatePatch {
                status: Some(S::CallCompleted),
                vapi_call_status: Some(call_status),
                vapi_call_completed_at: Some(now),
                ..CandidatePatch::at(now)
            }),
            _ => None,
        },

        VapiCallStatus::Voicemail
        | VapiCallStatus::NoAnswer
        | VapiCallStatus::Busy
        | VapiCallStatus::Failed => match status {
            S::Discovered | S::CallPending | S::CallInProgress => Some(CandidatePatch {
                status: Some(S::CallFailed),
                vapi_call_status: Some(call_status),
                vapi_call_completed_at: Some(now),
                ..CandidatePatch::at(now)
            }),
            _ => None,
        },
    };

    Ok(patch)
}

/// Plans and applies an event in place.
///
/// # Errors
///
/// Propagates [`plan`] errors; the candidate is left untouched on error.
pub fn apply(
    candidate: &mut LocationCandidate,
    event: &LifecycleEvent,
    now: DateTime<Utc>,
) -> Result<Transition, LifecycleError> {
    let from = candidate.status;
    match plan(candidate, event, now)? {
        None => Ok(Transition::Unchanged(from)),
        Some(patch) => {
            patch.apply(candidate);
            if candidate.status == from {
                Ok(Transition::Updated(from))
            } else {
                Ok(Transition::Moved {
                    from,
                    to: candidate.status,
                })
            }
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_test.rs"]
mod tests;
