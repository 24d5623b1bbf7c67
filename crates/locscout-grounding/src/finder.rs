use std::sync::Arc;

use async_trait::async_trait;
use locscout_core::LocationRequirement;
use locscout_llm::{CompletionRequest, TextCompletion};

use crate::error::GroundingError;
use crate::parse::{parse_venues, VenueRecord};
use crate::query::build_grounding_prompt;

/// Venues reported for one requirement plus any soft problems met on the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FoundVenues {
    pub venues: Vec<VenueRecord>,
    pub warnings: Vec<String>,
}

/// Provider-agnostic venue search.
#[async_trait]
pub trait CandidateFinder: Send + Sync {
    /// # Errors
    ///
    /// Returns [`GroundingError`] when the provider cannot be reached. An
    /// empty or malformed answer is not an error: it yields zero venues and a
    /// warning.
    async fn find(
        &self,
        requirement: &LocationRequirement,
        query: &str,
    ) -> Result<FoundVenues, GroundingError>;
}

/// Finds venues by asking a search-grounded completion model for a JSON array.
pub struct LlmCandidateFinder {
    llm: Arc<dyn TextCompletion>,
    model: Option<String>,
}

impl LlmCandidateFinder {
    #[must_use]
    pub fn new(llm: Arc<dyn TextCompletion>) -> Self {
        Self { llm, model: None }
    }

    /// Sends grounding prompts to `model` instead of the client's default.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

#[async_trait]
impl CandidateFinder for LlmCandidateFinder {
    async fn find(
        &self,
        requirement: &LocationRequirement,
        query: &str,
    ) -> Result<FoundVenues, GroundingError> {
        let mut request =
            CompletionRequest::new(build_grounding_prompt(requirement, query)).with_temperature(0.2);
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }
        let text = self.llm.complete(request).await?;

        match parse_venues(&text) {
            Ok(venues) => {
                let mut found = FoundVenues {
                    venues,
                    warnings: Vec::new(),
                };
                if found.venues.is_empty() {
                    found.warnings.push("No venues returned for query".to_string());
                }
                Ok(found)
            }
            Err(e) => {
                tracing::warn!(
                    scene = %requirement.scene_header,
                    error = %e,
                    "could not parse venue list, treating as empty"
                );
                Ok(FoundVenues {
                    venues: Vec::new(),
                    warnings: vec![format!("Could not parse venue list: {e}")],
                })
            }
        }
    }
}
