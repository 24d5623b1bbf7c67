//! Per-scene search specifications handed to the grounding pool.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::location::{InteriorExterior, TimeOfDay};

pub const DEFAULT_TARGET_CITY: &str = "Los Angeles, CA";
pub const DEFAULT_SEARCH_RADIUS_KM: f64 = 50.0;
pub const DEFAULT_MAX_RESULTS: usize = 10;
pub const DEFAULT_SHOOT_HOURS: u32 = 8;

/// Aesthetic classification of a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VibeCategory {
    Industrial,
    Luxury,
    UrbanGritty,
    Suburban,
    Natural,
    RetroVintage,
    Futuristic,
    Institutional,
    Commercial,
    Residential,
}

impl VibeCategory {
    pub const ALL: [VibeCategory; 10] = [
        Self::Industrial,
        Self::Luxury,
        Self::UrbanGritty,
        Self::Suburban,
        Self::Natural,
        Self::RetroVintage,
        Self::Futuristic,
        Self::Institutional,
        Self::Commercial,
        Self::Residential,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Industrial => "industrial",
            Self::Luxury => "luxury",
            Self::UrbanGritty => "urban-gritty",
            Self::Suburban => "suburban",
            Self::Natural => "natural",
            Self::RetroVintage => "retro-vintage",
            Self::Futuristic => "futuristic",
            Self::Institutional => "institutional",
            Self::Commercial => "commercial",
            Self::Residential => "residential",
        }
    }

    #[must_use]
    pub fn parse_exact(value: &str) -> Option<Self> {
        let normalized = value.trim().to_lowercase();
        Self::ALL.iter().copied().find(|v| v.as_str() == normalized)
    }

    /// Lenient parse for model output.
    ///
    /// Tries an exact match, then a substring match in either direction, and
    /// finally falls back to [`VibeCategory::Commercial`]. Blank input yields `None`.
    /// Use [`VibeCategory::parse_exact`] to detect the fallback.
    #[must_use]
    pub fn normalize(value: &str) -> Option<Self> {
        let normalized = value.trim().to_lowercase().replace(['_', ' '], "-");
        if normalized.is_empty() || normalized == "null" || normalized == "none" {
            return None;
        }
        if let Some(exact) = Self::ALL.iter().find(|v| v.as_str() == normalized) {
            return Some(*exact);
        }
        if let Some(partial) = Self::ALL
            .iter()
            .find(|v| normalized.contains(v.as_str()) || v.as_str().contains(normalized.as_str()))
        {
            return Some(*partial);
        }
        Some(Self::Commercial)
    }
}

impl std::fmt::Display for VibeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    #[default]
    Important,
    Flexible,
}

impl Priority {
    /// Lenient parse: "critical" or "flexible" anywhere in the text wins,
    /// everything else is `Important`.
    #[must_use]
    pub fn normalize(value: &str) -> Self {
        let normalized = value.to_lowercase();
        if normalized.contains("critical") {
            Self::Critical
        } else if normalized.contains("flexible") {
            Self::Flexible
        } else {
            Self::Important
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vibe {
    pub primary: VibeCategory,
    #[serde(default)]
    pub secondary: Option<VibeCategory>,
    #[serde(default)]
    pub descriptors: Vec<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    pub interior_exterior: InteriorExterior,
    pub time_of_day: TimeOfDay,
    #[serde(default)]
    pub special_requirements: Vec<String>,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            interior_exterior: InteriorExterior::Both,
            time_of_day: TimeOfDay::Both,
            special_requirements: Vec::new(),
        }
    }
}

/// One scene's search specification. Built once and consumed whole by the
/// grounding pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRequirement {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub scene_number: String,
    pub scene_header: String,
    #[serde(default)]
    pub page_numbers: Vec<u32>,
    #[serde(default)]
    pub script_excerpt: String,
    pub vibe: Vibe,
    #[serde(default)]
    pub constraints: Constraints,
    #[serde(default = "default_shoot_hours")]
    pub estimated_shoot_hours: u32,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "default_target_city")]
    pub target_city: String,
    #[serde(default = "default_search_radius_km")]
    pub search_radius_km: f64,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default)]
    pub location_description: String,
    #[serde(default)]
    pub scouting_notes: String,
}

fn default_shoot_hours() -> u32 {
    DEFAULT_SHOOT_HOURS
}

fn default_target_city() -> String {
    DEFAULT_TARGET_CITY.to_string()
}

fn default_search_radius_km() -> f64 {
    DEFAULT_SEARCH_RADIUS_KM
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}
