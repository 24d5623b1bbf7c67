use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use locscout_core::scoring::{apply_visual_assessment, score_candidate};
use locscout_core::{
    lifecycle, sort_by_score, AppConfig, GroundingResult, InteriorExterior, LocationCandidate,
    LocationRequirement, VapiCallStatus,
};
use locscout_llm::{ChatClient, TextCompletion};

use crate::error::GroundingError;
use crate::finder::{CandidateFinder, LlmCandidateFinder};
use crate::photos::{GooglePlacesPhotos, PhotoLookup};
use crate::query::build_search_query;
use crate::visual::{SonarVisualVerifier, VisualVerifier};

/// Visual scores below this count toward the low-match warning.
pub const LOW_VISUAL_SCORE: f64 = 0.5;

/// Grounds one requirement. Implementations report failures inside the
/// result's `errors` instead of returning them.
#[async_trait]
pub trait SceneGrounder: Send + Sync {
    async fn ground(&self, requirement: &LocationRequirement) -> GroundingResult;
}

/// Search, score, photos, then optional visual verification, all sequential
/// within one requirement.
pub struct GroundingAgent {
    finder: Arc<dyn CandidateFinder>,
    photos: Option<Arc<dyn PhotoLookup>>,
    verifier: Option<Arc<dyn VisualVerifier>>,
}

impl GroundingAgent {
    #[must_use]
    pub fn new(finder: Arc<dyn CandidateFinder>) -> Self {
        Self {
            finder,
            photos: None,
            verifier: None,
        }
    }

    #[must_use]
    pub fn with_photos(mut self, photos: Arc<dyn PhotoLookup>) -> Self {
        self.photos = Some(photos);
        self
    }

    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn VisualVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Wires the production providers. Photo lookup and visual verification
    /// are left out when their API keys are not configured.
    ///
    /// # Errors
    ///
    /// Returns [`GroundingError`] if an HTTP client cannot be built.
    pub fn from_config(llm: Arc<dyn TextCompletion>, config: &AppConfig) -> Result<Self, GroundingError> {
        let finder = LlmCandidateFinder::new(llm).with_model(config.grounding_model.clone());
        let mut agent = Self::new(Arc::new(finder));

        match &config.google_maps_api_key {
            Some(key) => {
                let photos = GooglePlacesPhotos::new(key, config.request_timeout_secs)?;
                agent = agent.with_photos(Arc::new(photos));
            }
            None => tracing::info!("GOOGLE_MAPS_API_KEY not set; photo lookup disabled"),
        }

        match &config.vision_api_key {
            Some(key) => {
                let vision = ChatClient::new(
                    &config.vision_base_url,
                    key,
                    &config.vision_model,
                    config.request_timeout_secs,
                )?
                .with_retry(config.llm_max_retries, config.retry_backoff_base_ms);
                let verifier = SonarVisualVerifier::new(Arc::new(vision), config.request_timeout_secs)?
                    .with_model(config.vision_model.clone());
                agent = agent.with_verifier(Arc::new(verifier));
            }
            None => tracing::info!("LOCSCOUT_VISION_API_KEY not set; visual verification disabled"),
        }

        Ok(agent)
    }

    async fn attach_photos(&self, requirement: &LocationRequirement, candidates: &mut [LocationCandidate]) {
        let Some(photos) = &self.photos else {
            return;
        };
        let prefer_interior = requirement.constraints.interior_exterior != InteriorExterior::Exterior;
        for candidate in candidates.iter_mut() {
            match photos.photos_for(candidate, prefer_interior).await {
                Ok(found) => {
                    if found.urls.is_empty() {
                        tracing::debug!(venue = %candidate.venue_name, "no photos found");
                    }
                    found.attach(candidate);
                }
                Err(e) => {
                    tracing::warn!(venue = %candidate.venue_name, error = %e, "photo lookup failed");
                }
            }
        }
    }

    /// Returns how many candidates with photos could not be verified.
    async fn verify(&self, requirement: &LocationRequirement, candidates: &mut [LocationCandidate]) -> usize {
        let Some(verifier) = &self.verifier else {
            return 0;
        };
        let mut failed = 0;
        for candidate in candidates.iter_mut() {
            let Some(url) = candidate.photo_urls.first().cloned() else {
                continue;
            };
            match verifier.assess(&url, requirement).await {
                Ok(assessment) => {
                    tracing::debug!(
                        venue = %candidate.venue_name,
                        visual_score = assessment.vibe_match_score,
                        "visual verification complete"
                    );
                    apply_visual_assessment(candidate, assessment);
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(venue = %candidate.venue_name, error = %e, "visual verification failed");
                }
            }
        }
        failed
    }
}

#[async_trait]
impl SceneGrounder for GroundingAgent {
    async fn ground(&self, requirement: &LocationRequirement) -> GroundingResult {
        let started = Instant::now();
        let query = build_search_query(requirement);
        let mut result = GroundingResult::empty(requirement, query.clone());
        tracing::info!(scene = %requirement.scene_header, query = %query, "grounding scene");

        match self.finder.find(requirement, &query).await {
            Err(e) => {
                tracing::warn!(scene = %requirement.scene_header, error = %e, "venue search failed");
                result.errors.push(e.to_string());
            }
            Ok(found) => {
                result.warnings.extend(found.warnings);
                let mut candidates: Vec<LocationCandidate> = found
                    .venues
                    .into_iter()
                    .map(|venue| {
                        let mut candidate = venue.into_candidate(requirement);
                        // The missing phone already costs the phone weight, so
                        // its review flag is added only after scoring.
                        score_candidate(&mut candidate);
                        lifecycle::initialize(&mut candidate);
                        candidate
                    })
                    .collect();
                sort_by_score(&mut candidates);
                candidates.truncate(requirement.max_results);

                self.attach_photos(requirement, &mut candidates).await;
                let unverified = self.verify(requirement, &mut candidates).await;
                sort_by_score(&mut candidates);

                let no_phone = candidates
                    .iter()
                    .filter(|c| c.vapi_call_status == VapiCallStatus::NoPhoneNumber)
                    .count();
                if no_phone > 0 {
                    result
                        .warnings
                        .push(format!("{no_phone} locations have no phone number"));
                }
                let low_visual = candidates
                    .iter()
                    .filter(|c| c.visual_vibe_score.is_some_and(|s| s < LOW_VISUAL_SCORE))
                    .count();
                if low_visual > 0 {
                    result.warnings.push(format!(
                        "{low_visual} locations have low visual vibe match (<0.5)"
                    ));
                }
                if unverified > 0 {
                    result
                        .warnings
                        .push(format!("Visual verification failed for {unverified} locations"));
                }

                result.total_found = candidates.len();
                result.candidates = candidates;
            }
        }

        result.processing_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            scene = %requirement.scene_header,
            candidates = result.total_found,
            errors = result.errors.len(),
            elapsed_ms = result.processing_time_ms,
            "scene grounded"
        );
        result
    }
}
