//! Venue candidates and per-scene grounding outcomes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::requirement::LocationRequirement;
use crate::CoreError;

/// Red flag attached to every candidate whose listing has no phone number.
pub const NO_PHONE_RED_FLAG: &str = "Phone number not available in listing";

/// Workflow state of a candidate. See [`crate::lifecycle`] for transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    #[default]
    Discovered,
    CallPending,
    CallInProgress,
    CallCompleted,
    CallFailed,
    HumanReview,
    Approved,
    Rejected,
    Booked,
}

impl CandidateStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::CallPending => "call_pending",
            Self::CallInProgress => "call_in_progress",
            Self::CallCompleted => "call_completed",
            Self::CallFailed => "call_failed",
            Self::HumanReview => "human_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Booked => "booked",
        }
    }

    /// True for the two states that imply a phone call is underway.
    #[must_use]
    pub fn is_calling(self) -> bool {
        matches!(self, Self::CallPending | Self::CallInProgress)
    }
}

impl std::fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CandidateStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "discovered" => Ok(Self::Discovered),
            "call_pending" => Ok(Self::CallPending),
            "call_in_progress" => Ok(Self::CallInProgress),
            "call_completed" => Ok(Self::CallCompleted),
            "call_failed" => Ok(Self::CallFailed),
            "human_review" => Ok(Self::HumanReview),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "booked" => Ok(Self::Booked),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

/// Status of the outreach phone call as reported by the voice provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VapiCallStatus {
    #[default]
    NotInitiated,
    Queued,
    Ringing,
    InProgress,
    Completed,
    Voicemail,
    NoAnswer,
    Busy,
    Failed,
    NoPhoneNumber,
}

impl VapiCallStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotInitiated => "not_initiated",
            Self::Queued => "queued",
            Self::Ringing => "ringing",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Voicemail => "voicemail",
            Self::NoAnswer => "no_answer",
            Self::Busy => "busy",
            Self::Failed => "failed",
            Self::NoPhoneNumber => "no_phone_number",
        }
    }

    /// Maps the provider's webhook vocabulary (`in-progress`, `ended`, ...) onto
    /// call statuses.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownCallStatus`] for strings outside the vocabulary.
    pub fn from_provider(status: &str) -> Result<Self, CoreError> {
        match status.trim().to_lowercase().as_str() {
            "queued" => Ok(Self::Queued),
            "ringing" => Ok(Self::Ringing),
            "in-progress" | "in_progress" => Ok(Self::InProgress),
            "ended" | "completed" => Ok(Self::Completed),
            "voicemail" => Ok(Self::Voicemail),
            "no-answer" | "no_answer" => Ok(Self::NoAnswer),
            "busy" => Ok(Self::Busy),
            "failed" => Ok(Self::Failed),
            other => Err(CoreError::UnknownCallStatus(other.to_string())),
        }
    }

    /// True for outcomes where the call ended without a conversation.
    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::Voicemail | Self::NoAnswer | Self::Busy | Self::Failed
        )
    }
}

impl std::fmt::Display for VapiCallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One real-world venue matched to a requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationCandidate {
    pub id: Uuid,
    pub scene_id: Uuid,
    #[serde(default)]
    pub project_id: String,

    #[serde(default)]
    pub google_place_id: Option<String>,
    pub venue_name: String,
    #[serde(default)]
    pub formatted_address: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,

    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub website_url: Option<String>,

    #[serde(default)]
    pub google_rating: Option<f64>,
    #[serde(default)]
    pub google_review_count: u32,
    #[serde(default)]
    pub price_level: Option<u8>,
    #[serde(default)]
    pub photo_urls: Vec<String>,
    #[serde(default)]
    pub photo_attributions: Vec<String>,

    pub match_score: f64,
    /// Score before the first visual blend; keeps repeated passes from compounding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_visual_score: Option<f64>,
    #[serde(default)]
    pub match_reasoning: String,
    #[serde(default)]
    pub distance_from_center_km: Option<f64>,

    #[serde(default)]
    pub visual_vibe_score: Option<f64>,
    #[serde(default)]
    pub visual_features_detected: Vec<String>,
    #[serde(default)]
    pub visual_concerns: Vec<String>,
    #[serde(default)]
    pub visual_analysis_summary: Option<String>,

    #[serde(default)]
    pub vapi_call_status: VapiCallStatus,
    #[serde(default)]
    pub vapi_call_id: Option<String>,
    #[serde(default)]
    pub vapi_call_initiated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub vapi_call_completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub vapi_call_duration_seconds: Option<f64>,
    #[serde(default)]
    pub vapi_recording_url: Option<String>,
    #[serde(default)]
    pub vapi_transcript: Option<String>,
    #[serde(default)]
    pub call_report_received_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub venue_available: Option<bool>,
    #[serde(default)]
    pub availability_details: Option<String>,
    #[serde(default)]
    pub negotiated_price: Option<Decimal>,
    #[serde(default)]
    pub price_unit: Option<String>,
    #[serde(default)]
    pub manager_name: Option<String>,
    #[serde(default)]
    pub manager_title: Option<String>,
    #[serde(default)]
    pub manager_email: Option<String>,
    #[serde(default)]
    pub reservation_method: Option<String>,
    #[serde(default)]
    pub reservation_details: Option<String>,
    #[serde(default)]
    pub call_summary: Option<String>,
    #[serde(default)]
    pub call_success_evaluation: Option<String>,

    /// Append-only.
    #[serde(default)]
    pub red_flags: Vec<String>,

    #[serde(default)]
    pub status: CandidateStatus,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub booking_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LocationCandidate {
    /// A freshly discovered candidate with no score, contacts, or call data.
    #[must_use]
    pub fn new(scene_id: Uuid, project_id: impl Into<String>, venue_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            scene_id,
            project_id: project_id.into(),
            google_place_id: None,
            venue_name: venue_name.into(),
            formatted_address: String::new(),
            latitude: 0.0,
            longitude: 0.0,
            phone_number: None,
            website_url: None,
            google_rating: None,
            google_review_count: 0,
            price_level: None,
            photo_urls: Vec::new(),
            photo_attributions: Vec::new(),
            match_score: 0.0,
            pre_visual_score: None,
            match_reasoning: String::new(),
            distance_from_center_km: None,
            visual_vibe_score: None,
            visual_features_detected: Vec::new(),
            visual_concerns: Vec::new(),
            visual_analysis_summary: None,
            vapi_call_status: VapiCallStatus::NotInitiated,
            vapi_call_id: None,
            vapi_call_initiated_at: None,
            vapi_call_completed_at: None,
            vapi_call_duration_seconds: None,
            vapi_recording_url: None,
            vapi_transcript: None,
            call_report_received_at: None,
            venue_available: None,
            availability_details: None,
            negotiated_price: None,
            price_unit: None,
            manager_name: None,
            manager_title: None,
            manager_email: None,
            reservation_method: None,
            reservation_details: None,
            call_summary: None,
            call_success_evaluation: None,
            red_flags: Vec::new(),
            status: CandidateStatus::Discovered,
            rejection_reason: None,
            approved_by: None,
            approved_at: None,
            booking_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn has_phone(&self) -> bool {
        self.phone_number
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty())
    }

    #[must_use]
    pub fn has_website(&self) -> bool {
        self.website_url
            .as_deref()
            .is_some_and(|w| !w.trim().is_empty())
    }

    /// Appends a red flag unless an identical one is already present.
    pub fn add_red_flag(&mut self, flag: impl Into<String>) {
        let flag = flag.into();
        if !self.red_flags.contains(&flag) {
            self.red_flags.push(flag);
        }
    }
}

/// Outcome of grounding one requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingResult {
    pub scene_id: Uuid,
    pub scene_header: String,
    pub query_used: String,
    /// Sorted by descending match score.
    pub candidates: Vec<LocationCandidate>,
    pub total_found: usize,
    pub processing_time_ms: u64,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl GroundingResult {
    #[must_use]
    pub fn empty(requirement: &LocationRequirement, query_used: impl Into<String>) -> Self {
        Self {
            scene_id: requirement.id,
            scene_header: requirement.scene_header.clone(),
            query_used: query_used.into(),
            candidates: Vec::new(),
            total_found: 0,
            processing_time_ms: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// A result carrying a single error and no candidates.
    #[must_use]
    pub fn failed(requirement: &LocationRequirement, error: impl Into<String>) -> Self {
        let mut result = Self::empty(requirement, String::new());
        result.errors.push(error.into());
        result
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            CandidateStatus::Discovered,
            CandidateStatus::CallInProgress,
            CandidateStatus::HumanReview,
            CandidateStatus::Booked,
        ] {
            assert_eq!(status.as_str().parse::<CandidateStatus>(), Ok(status));
        }
        assert!("pending".parse::<CandidateStatus>().is_err());
    }

    #[test]
    fn provider_status_vocabulary() {
        assert_eq!(
            VapiCallStatus::from_provider("in-progress"),
            Ok(VapiCallStatus::InProgress)
        );
        assert_eq!(
            VapiCallStatus::from_provider("ended"),
            Ok(VapiCallStatus::Completed)
        );
        assert_eq!(
            VapiCallStatus::from_provider("no-answer"),
            Ok(VapiCallStatus::NoAnswer)
        );
        assert!(VapiCallStatus::from_provider("forwarding").is_err());
    }

    #[test]
    fn blank_phone_is_not_a_phone() {
        let mut c = LocationCandidate::new(Uuid::new_v4(), "p", "Venue");
        assert!(!c.has_phone());
        c.phone_number = Some("  ".to_string());
        assert!(!c.has_phone());
        c.phone_number = Some("+1 555 0100".to_string());
        assert!(c.has_phone());
    }

    #[test]
    fn add_red_flag_skips_duplicates() {
        let mut c = LocationCandidate::new(Uuid::new_v4(), "p", "Venue");
        c.add_red_flag("Limited parking");
        c.add_red_flag("Limited parking");
        assert_eq!(c.red_flags, vec!["Limited parking".to_string()]);
    }

    #[test]
    fn candidate_serializes_status_snake_case() {
        let mut c = LocationCandidate::new(Uuid::new_v4(), "p", "Venue");
        c.status = CandidateStatus::HumanReview;
        c.vapi_call_status = VapiCallStatus::NoPhoneNumber;
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["status"], "human_review");
        assert_eq!(json["vapi_call_status"], "no_phone_number");
        assert!(json.get("pre_visual_score").is_none());
    }
}
