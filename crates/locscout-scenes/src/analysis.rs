//! Turns deduplicated locations into search requirements, one completion each.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use locscout_core::requirement::{
    DEFAULT_MAX_RESULTS, DEFAULT_SEARCH_RADIUS_KM, DEFAULT_SHOOT_HOURS, DEFAULT_TARGET_CITY,
};
use locscout_core::{
    AppConfig, Constraints, InteriorExterior, LocationRequirement, Priority, TimeOfDay, UniqueLocation, Vibe,
    VibeCategory,
};
use locscout_llm::{extract_json_object, truncate_chars, CompletionRequest, TextCompletion};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ScenesError;
use crate::prompts;

const EXCERPT_CHARS: usize = 500;

#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub project_id: String,
    pub target_city: String,
    pub max_results: usize,
    pub max_concurrent: usize,
    pub model: Option<String>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            target_city: DEFAULT_TARGET_CITY.to_string(),
            max_results: DEFAULT_MAX_RESULTS,
            max_concurrent: 8,
            model: None,
        }
    }
}

impl AnalysisOptions {
    /// Defaults for `project_id` taken from the application config.
    #[must_use]
    pub fn from_app_config(config: &AppConfig, project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            target_city: config.default_city.clone(),
            max_results: config.default_max_results,
            max_concurrent: config.analysis_max_concurrent,
            model: Some(config.llm_model.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisFailure {
    pub scene_header: String,
    pub error: String,
}

/// Outcome of a batch analysis. Every input location lands in exactly one of
/// the two lists; `requirements` keeps input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisBatch {
    pub requirements: Vec<LocationRequirement>,
    pub failures: Vec<AnalysisFailure>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    vibe: RawVibe,
    #[serde(default)]
    constraints: RawConstraints,
    #[serde(default)]
    location_description: Option<String>,
    #[serde(default)]
    scouting_notes: Option<String>,
    #[serde(default)]
    estimated_shoot_hours: Option<Value>,
    #[serde(default)]
    priority: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawVibe {
    #[serde(default)]
    primary: Option<String>,
    #[serde(default)]
    secondary: Option<String>,
    #[serde(default)]
    descriptors: Option<Vec<String>>,
    #[serde(default)]
    confidence: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawConstraints {
    #[serde(default)]
    interior_exterior: Option<String>,
    #[serde(default)]
    time_of_day: Option<String>,
    #[serde(default)]
    special_requirements: Option<Vec<String>>,
}

fn parse_interior_exterior(value: &str) -> Option<InteriorExterior> {
    let v = value.trim().to_lowercase();
    let has_int = v.contains("int");
    let has_ext = v.contains("ext");
    if v.contains("both") || (has_int && has_ext) {
        Some(InteriorExterior::Both)
    } else if has_int {
        Some(InteriorExterior::Interior)
    } else if has_ext {
        Some(InteriorExterior::Exterior)
    } else {
        None
    }
}

fn parse_time_of_day(value: &str) -> Option<TimeOfDay> {
    TimeOfDay::from_label(value).or_else(|| {
        let v = value.to_lowercase();
        (v.contains("day") && v.contains("night")).then_some(TimeOfDay::Both)
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_shoot_hours(value: Option<&Value>) -> u32 {
    let hours = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match hours {
        Some(h) if h.is_finite() && h >= 1.0 => h.round().min(f64::from(u32::MAX)) as u32,
        Some(h) if h.is_finite() && h > 0.0 => 1,
        _ => DEFAULT_SHOOT_HOURS,
    }
}

fn normalize_vibe(value: &str, header: &str) -> Option<VibeCategory> {
    let category = VibeCategory::normalize(value)?;
    if VibeCategory::parse_exact(value).is_none() {
        tracing::warn!(
            scene = %header,
            raw = %value,
            normalized = %category,
            "vibe category did not match exactly, normalized"
        );
    }
    Some(category)
}

fn clean_list(items: Option<Vec<String>>) -> Vec<String> {
    items
        .unwrap_or_default()
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub struct RequirementAnalyzer {
    llm: Arc<dyn TextCompletion>,
    options: AnalysisOptions,
}

impl RequirementAnalyzer {
    #[must_use]
    pub fn new(llm: Arc<dyn TextCompletion>, options: AnalysisOptions) -> Self {
        Self { llm, options }
    }

    /// Analyzes one location. `scene_index` is 1-based and becomes `SC_001`.
    ///
    /// # Errors
    ///
    /// Returns [`ScenesError`] when the completion fails, the response holds no
    /// JSON object, or the object lacks a usable primary vibe.
    pub async fn analyze(
        &self,
        location: &UniqueLocation,
        scene_index: usize,
    ) -> Result<LocationRequirement, ScenesError> {
        let vibes = VibeCategory::ALL
            .iter()
            .map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let mut request = CompletionRequest::new(prompts::analysis(location, &vibes)).json();
        if let Some(model) = &self.options.model {
            request = request.with_model(model.clone());
        }
        let text = self.llm.complete(request).await?;
        let value = extract_json_object(&text)?;
        let raw: RawAnalysis = serde_json::from_value(value).map_err(|source| {
            ScenesError::InvalidResponse {
                context: "requirement analysis",
                source,
            }
        })?;
        self.build_requirement(location, scene_index, raw)
    }

    fn build_requirement(
        &self,
        location: &UniqueLocation,
        scene_index: usize,
        raw: RawAnalysis,
    ) -> Result<LocationRequirement, ScenesError> {
        let header = location.header();
        let primary = raw
            .vibe
            .primary
            .as_deref()
            .and_then(|p| normalize_vibe(p, header))
            .ok_or_else(|| ScenesError::MissingVibe(header.to_string()))?;
        let secondary = raw
            .vibe
            .secondary
            .as_deref()
            .and_then(|s| normalize_vibe(s, header))
            .filter(|s| *s != primary);

        let constraints = Constraints {
            interior_exterior: raw
                .constraints
                .interior_exterior
                .as_deref()
                .and_then(parse_interior_exterior)
                .unwrap_or(location.interior_exterior()),
            time_of_day: raw
                .constraints
                .time_of_day
                .as_deref()
                .and_then(parse_time_of_day)
                .unwrap_or(location.time_of_day()),
            special_requirements: clean_list(raw.constraints.special_requirements),
        };

        Ok(LocationRequirement {
            id: Uuid::new_v4(),
            project_id: self.options.project_id.clone(),
            scene_number: format!("SC_{scene_index:03}"),
            scene_header: header.to_string(),
            page_numbers: location.page_numbers().to_vec(),
            script_excerpt: truncate_chars(&location.combined_context(), EXCERPT_CHARS).to_string(),
            vibe: Vibe {
                primary,
                secondary,
                descriptors: clean_list(raw.vibe.descriptors),
                confidence: raw.vibe.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
            },
            constraints,
            estimated_shoot_hours: parse_shoot_hours(raw.estimated_shoot_hours.as_ref()),
            priority: raw
                .priority
                .as_deref()
                .map_or(Priority::Important, Priority::normalize),
            target_city: self.options.target_city.clone(),
            search_radius_km: DEFAULT_SEARCH_RADIUS_KM,
            max_results: self.options.max_results,
            location_description: raw.location_description.unwrap_or_default(),
            scouting_notes: raw.scouting_notes.unwrap_or_default(),
        })
    }

    /// Analyzes every location with at most `max_concurrent` completions in
    /// flight. Failures are collected per location and never stop the batch.
    pub async fn analyze_all(&self, locations: &[UniqueLocation]) -> AnalysisBatch {
        let concurrency = self.options.max_concurrent.max(1);
        let mut outcomes: Vec<(usize, Result<LocationRequirement, ScenesError>)> =
            stream::iter(locations.iter().enumerate())
                .map(|(i, location)| async move { (i, self.analyze(location, i + 1).await) })
                .buffer_unordered(concurrency)
                .collect::<Vec<_>>()
                .boxed()
                .await;
        outcomes.sort_by_key(|(i, _)| *i);

        let mut batch = AnalysisBatch::default();
        for (i, outcome) in outcomes {
            match outcome {
                Ok(requirement) => batch.requirements.push(requirement),
                Err(e) => {
                    let scene_header = locations[i].header().to_string();
                    tracing::warn!(scene = %scene_header, error = %e, "location analysis failed");
                    batch.failures.push(AnalysisFailure {
                        scene_header,
                        error: e.to_string(),
                    });
                }
            }
        }
        tracing::info!(
            analyzed = batch.requirements.len(),
            failed = batch.failures.len(),
            "requirement analysis complete"
        );
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interior_exterior_is_lenient() {
        assert_eq!(parse_interior_exterior("Interior"), Some(InteriorExterior::Interior));
        assert_eq!(parse_interior_exterior("EXT"), Some(InteriorExterior::Exterior));
        assert_eq!(parse_interior_exterior("int/ext"), Some(InteriorExterior::Both));
        assert_eq!(parse_interior_exterior("both"), Some(InteriorExterior::Both));
        assert_eq!(parse_interior_exterior("unclear"), None);
    }

    #[test]
    fn time_of_day_accepts_labels_and_pairs() {
        assert_eq!(parse_time_of_day("dusk"), Some(TimeOfDay::Night));
        assert_eq!(parse_time_of_day("Day and night"), Some(TimeOfDay::Both));
        assert_eq!(parse_time_of_day("whenever"), None);
    }

    #[test]
    fn shoot_hours_defaults_and_rounds() {
        assert_eq!(parse_shoot_hours(None), DEFAULT_SHOOT_HOURS);
        assert_eq!(parse_shoot_hours(Some(&serde_json::json!(5.6))), 6);
        assert_eq!(parse_shoot_hours(Some(&serde_json::json!("4"))), 4);
        assert_eq!(parse_shoot_hours(Some(&serde_json::json!(0.5))), 1);
        assert_eq!(parse_shoot_hours(Some(&serde_json::json!(-3))), DEFAULT_SHOOT_HOURS);
        assert_eq!(parse_shoot_hours(Some(&serde_json::json!("lots"))), DEFAULT_SHOOT_HOURS);
    }
}
