//! Resolves location requirements to real venues.
//!
//! [`GroundingAgent`] handles one requirement: find venues, score them, fetch
//! photos, and optionally verify the look. [`GroundingPool`] fans a batch of
//! requirements out over a bounded number of workers and streams
//! [`GroundingEvent`]s as each one completes.

pub mod agent;
mod error;
pub mod events;
pub mod finder;
pub mod parse;
pub mod photos;
pub mod pool;
pub mod query;
pub mod visual;

pub use agent::{GroundingAgent, SceneGrounder};
pub use error::GroundingError;
pub use events::{GroundingEvent, RunSummary};
pub use finder::{CandidateFinder, FoundVenues, LlmCandidateFinder};
pub use parse::{parse_venues, VenueRecord};
pub use photos::{GooglePlacesPhotos, PhotoLookup, PlacePhotos};
pub use pool::{GroundingPool, GroundingRun, PoolOptions, PoolOutcome};
pub use query::{build_grounding_prompt, build_search_query, city_coordinates, search_terms};
pub use visual::{build_visual_prompt, SonarVisualVerifier, VisualVerifier};
