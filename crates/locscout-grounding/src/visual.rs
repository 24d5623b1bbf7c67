//! Photo-based vibe verification through a vision-capable completion model.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use locscout_core::{InteriorExterior, LocationRequirement, VisualAssessment};
use locscout_llm::{extract_json_object, CompletionRequest, TextCompletion};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::error::GroundingError;

#[async_trait]
pub trait VisualVerifier: Send + Sync {
    /// Scores one photo against the requirement's vibe and interior/exterior need.
    ///
    /// # Errors
    ///
    /// Returns [`GroundingError`] when the image cannot be fetched, the model
    /// call fails, or the answer has no usable score.
    async fn assess(
        &self,
        image_url: &str,
        requirement: &LocationRequirement,
    ) -> Result<VisualAssessment, GroundingError>;
}

fn location_type_rule(interior_exterior: InteriorExterior) -> &'static str {
    match interior_exterior {
        InteriorExterior::Interior => {
            "This MUST be an INTERIOR shot showing indoor spaces. Exterior/building shots should score LOW."
        }
        InteriorExterior::Exterior => {
            "This MUST be an EXTERIOR shot showing the outside/facade. Interior shots should score LOW."
        }
        InteriorExterior::Both => "This can be either interior or exterior.",
    }
}

#[must_use]
pub fn build_visual_prompt(requirement: &LocationRequirement) -> String {
    let ie = requirement.constraints.interior_exterior;
    let mut prompt = String::from(
        "You are a professional film location scout evaluating venue photos.\n\n",
    );
    let _ = writeln!(prompt, "**Scene:** {}", requirement.scene_header);
    let _ = writeln!(prompt, "**Required Vibe:** {}", requirement.vibe.primary);
    let _ = writeln!(
        prompt,
        "**Descriptors:** {}",
        requirement.vibe.descriptors.join(", ")
    );
    if let Some(secondary) = requirement.vibe.secondary {
        let _ = writeln!(prompt, "**Secondary Vibe:** {secondary}");
    }
    let _ = writeln!(
        prompt,
        "**Location Type Required:** {}",
        ie.to_string().to_uppercase()
    );
    let _ = writeln!(prompt, "{}", location_type_rule(ie));
    if !requirement.constraints.special_requirements.is_empty() {
        let _ = writeln!(
            prompt,
            "**Special Requirements:** {}",
            requirement.constraints.special_requirements.join(", ")
        );
    }
    prompt.push_str(
        r#"
BE STRICT in your evaluation. This is for a professional film production.

Critical evaluation criteria:
1. Does this photo show the CORRECT type (interior vs exterior)?
2. Does the aesthetic ACTUALLY match what's needed?
3. Are there visible issues that would require expensive fixes (modern fixtures, branding, wrong period)?
4. Would a location scout recommend this venue to the director?

Respond with ONLY a JSON object (no markdown, no extra text):
{
    "vibe_match_score": 0.85,
    "is_interior": true,
    "detected_features": ["exposed brick walls", "high industrial ceilings"],
    "concerns": ["modern light fixtures visible"],
    "summary": "Strong industrial aesthetic with authentic warehouse features."
}

Rules for scoring:
- 0.9-1.0: Perfect match, exactly the vibe needed AND correct interior/exterior type
- 0.7-0.89: Good match, minor adjustments needed
- 0.5-0.69: Partial match, significant set dressing required OR wrong interior/exterior type
- 0.3-0.49: Poor match, major concerns
- 0.0-0.29: Does not match the required vibe at all"#,
    );
    prompt
}

/// Mime type for a data URI, from the response's `Content-Type`.
fn image_mime(content_type: Option<&str>) -> &'static str {
    let content_type = content_type.unwrap_or_default().to_lowercase();
    if content_type.contains("png") {
        "image/png"
    } else if content_type.contains("webp") {
        "image/webp"
    } else if content_type.contains("gif") {
        "image/gif"
    } else {
        "image/jpeg"
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawAssessment {
    #[serde(default)]
    vibe_match_score: Option<Value>,
    #[serde(default)]
    is_interior: Option<bool>,
    #[serde(default)]
    detected_features: Option<Vec<String>>,
    #[serde(default)]
    concerns: Option<Vec<String>>,
    #[serde(default)]
    summary: Option<String>,
}

/// Scores arrive as `0.8`, `"0.8"`, or occasionally `80`.
fn parse_score(value: Option<&Value>) -> Option<f64> {
    let score = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
        _ => None,
    }?;
    if !score.is_finite() || score < 0.0 {
        return None;
    }
    let score = if score > 1.0 && score <= 100.0 {
        score / 100.0
    } else {
        score
    };
    Some(score.clamp(0.0, 1.0))
}

fn into_assessment(raw: RawAssessment) -> Result<VisualAssessment, GroundingError> {
    let vibe_match_score = parse_score(raw.vibe_match_score.as_ref())
        .ok_or(GroundingError::MissingField("vibe_match_score"))?;
    let clean = |items: Option<Vec<String>>| -> Vec<String> {
        items
            .unwrap_or_default()
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    };
    Ok(VisualAssessment {
        vibe_match_score,
        is_interior: raw.is_interior,
        detected_features: clean(raw.detected_features),
        concerns: clean(raw.concerns),
        summary: raw.summary.unwrap_or_default().trim().to_string(),
    })
}

/// Downloads the photo, inlines it as a base64 data URI, and asks a vision
/// model (Perplexity Sonar by default) for a JSON assessment.
pub struct SonarVisualVerifier {
    client: Client,
    llm: Arc<dyn TextCompletion>,
    model: Option<String>,
}

impl SonarVisualVerifier {
    /// # Errors
    ///
    /// Returns [`GroundingError::Http`] if the image-download client cannot be built.
    pub fn new(llm: Arc<dyn TextCompletion>, timeout_secs: u64) -> Result<Self, GroundingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            llm,
            model: None,
        })
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    async fn fetch_data_uri(&self, image_url: &str) -> Result<String, GroundingError> {
        let response = self.client.get(image_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GroundingError::UnexpectedStatus {
                status: status.as_u16(),
                endpoint: "image download",
            });
        }
        let mime = image_mime(
            response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        );
        let bytes = response.bytes().await?;
        Ok(format!("data:{mime};base64,{}", STANDARD.encode(&bytes)))
    }
}

#[async_trait]
impl VisualVerifier for SonarVisualVerifier {
    async fn assess(
        &self,
        image_url: &str,
        requirement: &LocationRequirement,
    ) -> Result<VisualAssessment, GroundingError> {
        let data_uri = self.fetch_data_uri(image_url).await?;
        let mut request = CompletionRequest::new(build_visual_prompt(requirement)).with_image(data_uri);
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }
        let text = self.llm.complete(request).await?;
        let value = extract_json_object(&text)?;
        let raw: RawAssessment =
            serde_json::from_value(value).map_err(|source| GroundingError::Deserialize {
                context: "visual assessment",
                source,
            })?;
        into_assessment(raw)
    }
}
