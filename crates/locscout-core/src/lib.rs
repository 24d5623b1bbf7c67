pub mod app_config;
pub mod candidate;
pub mod config;
pub mod lifecycle;
pub mod location;
pub mod requirement;
pub mod scoring;

pub use app_config::{AppConfig, Environment};
pub use candidate::{CandidateStatus, GroundingResult, LocationCandidate, VapiCallStatus};
pub use config::{load_app_config, load_app_config_from_env};
pub use lifecycle::{CallReport, CandidatePatch, LifecycleError, LifecycleEvent, Transition};
pub use location::{InteriorExterior, SceneOccurrence, TimeOfDay, UniqueLocation};
pub use requirement::{Constraints, LocationRequirement, Priority, Vibe, VibeCategory};
pub use scoring::{compute_match_score, sort_by_score, VisualAssessment};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("location '{0}' has no scene occurrences")]
    EmptyOccurrences(String),
    #[error("unknown candidate status: {0}")]
    UnknownStatus(String),
    #[error("unknown call status: {0}")]
    UnknownCallStatus(String),
}
