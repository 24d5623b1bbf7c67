//! Composite match scoring for venue candidates.

use serde::{Deserialize, Serialize};

use crate::candidate::LocationCandidate;

pub const PHONE_WEIGHT: f64 = 0.25;
pub const REASONING_WEIGHT: f64 = 0.25;
pub const RATING_WEIGHT: f64 = 0.25;
pub const WEBSITE_WEIGHT: f64 = 0.10;
pub const CLEAN_RECORD_WEIGHT: f64 = 0.15;

/// Share of the blended score taken from the pre-visual score.
pub const BASE_BLEND: f64 = 0.6;
/// Share of the blended score taken from the visual vibe score.
pub const VISUAL_BLEND: f64 = 0.4;

pub const VISUAL_FLAG_PREFIX: &str = "Visual: ";

/// Result of checking one photo against the required vibe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualAssessment {
    pub vibe_match_score: f64,
    #[serde(default)]
    pub is_interior: Option<bool>,
    #[serde(default)]
    pub detected_features: Vec<String>,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

fn rating_credit(rating: Option<f64>, review_count: u32) -> f64 {
    match rating {
        Some(r) if r >= 4.0 && review_count >= 50 => RATING_WEIGHT,
        Some(r) if r >= 3.5 => 0.15,
        Some(r) if r >= 3.0 => 0.10,
        _ => 0.0,
    }
}

fn red_flag_credit(count: usize) -> f64 {
    match count {
        0 => CLEAN_RECORD_WEIGHT,
        1 => 0.10,
        _ => 0.0,
    }
}

/// Weighted sum over listing completeness and quality, clamped to `[0, 1]`.
///
/// The weights are fixed:
///
/// | Signal                                   | Credit |
/// |------------------------------------------|--------|
/// | phone number present                     | 0.25   |
/// | non-empty match reasoning                | 0.25   |
/// | rating ≥ 4.0 with ≥ 50 reviews           | 0.25   |
/// | rating ≥ 3.5                             | 0.15   |
/// | rating ≥ 3.0                             | 0.10   |
/// | website present                          | 0.10   |
/// | no red flags / one red flag              | 0.15 / 0.10 |
#[must_use]
pub fn compute_match_score(candidate: &LocationCandidate) -> f64 {
    let mut score = 0.0;
    if candidate.has_phone() {
        score += PHONE_WEIGHT;
    }
    if !candidate.match_reasoning.trim().is_empty() {
        score += REASONING_WEIGHT;
    }
    score += rating_credit(candidate.google_rating, candidate.google_review_count);
    if candidate.has_website() {
        score += WEBSITE_WEIGHT;
    }
    score += red_flag_credit(candidate.red_flags.len());
    score.clamp(0.0, 1.0)
}

/// Recomputes and stores the base score.
pub fn score_candidate(candidate: &mut LocationCandidate) {
    candidate.match_score = compute_match_score(candidate);
    candidate.pre_visual_score = None;
}

/// Blends a visual vibe score into the match score.
///
/// The blend always starts from the score the candidate had before its first
/// visual blend, so a second verification pass replaces rather than compounds.
pub fn blend_visual_score(candidate: &mut LocationCandidate, visual_score: f64) {
    let visual = visual_score.clamp(0.0, 1.0);
    let base = *candidate
        .pre_visual_score
        .get_or_insert(candidate.match_score);
    candidate.match_score = (base * BASE_BLEND + visual * VISUAL_BLEND).clamp(0.0, 1.0);
    candidate.visual_vibe_score = Some(visual);
}

/// Records a visual assessment on the candidate.
///
/// Concerns are appended to the red flags with a `Visual: ` prefix before the
/// blend, and the base weighted sum is not recomputed.
pub fn apply_visual_assessment(candidate: &mut LocationCandidate, assessment: VisualAssessment) {
    for concern in &assessment.concerns {
        let concern = concern.trim();
        if !concern.is_empty() {
            candidate.add_red_flag(format!("{VISUAL_FLAG_PREFIX}{concern}"));
        }
    }
    candidate.visual_features_detected = assessment.detected_features;
    candidate.visual_concerns = assessment.concerns;
    if !assessment.summary.trim().is_empty() {
        candidate.visual_analysis_summary = Some(assessment.summary);
    }
    blend_visual_score(candidate, assessment.vibe_match_score);
}

/// Stable sort by descending score; ties keep discovery order.
pub fn sort_by_score(candidates: &mut [LocationCandidate]) {
    candidates.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));
}
