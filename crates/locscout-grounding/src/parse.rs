//! Lenient parsing of venue records from completion text.
//!
//! Models return numbers as strings, omit fields, and wrap arrays in prose or
//! code fences. Anything unusable degrades to an absent field; a record only
//! disappears when it is not a JSON object at all.

use locscout_core::{LocationCandidate, LocationRequirement};
use locscout_llm::{extract_json_array, LlmError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const UNKNOWN_VENUE: &str = "Unknown Venue";

/// One venue as reported by the finder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VenueRecord {
    pub venue_name: String,
    pub formatted_address: String,
    pub place_id: Option<String>,
    pub phone_number: Option<String>,
    pub website_url: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub google_rating: Option<f64>,
    pub google_review_count: u32,
    pub match_reasoning: String,
    pub potential_concerns: Vec<String>,
}

fn text(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty() && !s.eq_ignore_ascii_case("null") && !s.eq_ignore_ascii_case("n/a"))
                .then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    let n = match obj.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn count(obj: &Map<String, Value>, key: &str) -> u32 {
    number(obj, key)
        .filter(|n| *n >= 0.0)
        .map_or(0, |n| n.min(f64::from(u32::MAX)) as u32)
}

fn strings(obj: &Map<String, Value>, key: &str) -> Vec<String> {
    match obj.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

impl VenueRecord {
    /// Reads one record from a JSON object, tolerating missing or mistyped fields.
    #[must_use]
    pub fn from_json(obj: &Map<String, Value>) -> Self {
        Self {
            venue_name: text(obj, "venue_name")
                .or_else(|| text(obj, "name"))
                .unwrap_or_else(|| UNKNOWN_VENUE.to_string()),
            formatted_address: text(obj, "formatted_address")
                .or_else(|| text(obj, "address"))
                .unwrap_or_default(),
            place_id: text(obj, "place_id").or_else(|| text(obj, "google_place_id")),
            phone_number: text(obj, "phone_number"),
            website_url: text(obj, "website_url").or_else(|| text(obj, "website")),
            latitude: number(obj, "latitude"),
            longitude: number(obj, "longitude"),
            google_rating: number(obj, "google_rating").filter(|r| (0.0..=5.0).contains(r)),
            google_review_count: count(obj, "google_review_count"),
            match_reasoning: text(obj, "match_reasoning").unwrap_or_default(),
            potential_concerns: strings(obj, "potential_concerns"),
        }
    }

    /// Converts into an unscored candidate owned by `requirement`. Concerns
    /// become red flags.
    #[must_use]
    pub fn into_candidate(self, requirement: &LocationRequirement) -> LocationCandidate {
        let mut candidate =
            LocationCandidate::new(requirement.id, requirement.project_id.clone(), self.venue_name);
        candidate.formatted_address = self.formatted_address;
        candidate.google_place_id = self.place_id;
        candidate.phone_number = self.phone_number;
        candidate.website_url = self.website_url;
        candidate.latitude = self.latitude.unwrap_or(0.0);
        candidate.longitude = self.longitude.unwrap_or(0.0);
        candidate.google_rating = self.google_rating;
        candidate.google_review_count = self.google_review_count;
        candidate.match_reasoning = self.match_reasoning;
        // Kept as listed, repeats included, since the count drives scoring.
        candidate.red_flags = self.potential_concerns;
        candidate
    }
}

/// Extracts venue records from completion text.
///
/// # Errors
///
/// [`LlmError::NoJson`] when the text holds no JSON array and
/// [`LlmError::Deserialize`] when the array is malformed. Callers treat both
/// as zero venues.
pub fn parse_venues(text: &str) -> Result<Vec<VenueRecord>, LlmError> {
    let value = extract_json_array(text)?;
    let records = value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .map(VenueRecord::from_json)
                .collect()
        })
        .unwrap_or_default();
    Ok(records)
}
