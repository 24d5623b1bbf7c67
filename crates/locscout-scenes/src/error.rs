use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScenesError {
    #[error("completion failed: {0}")]
    Llm(#[from] locscout_llm::LlmError),

    #[error("unexpected response shape for {context}: {source}")]
    InvalidResponse {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("analysis for '{0}' did not include a vibe category")]
    MissingVibe(String),
}
