use thiserror::Error;

#[derive(Debug, Error)]
pub enum GroundingError {
    #[error("completion failed: {0}")]
    Llm(#[from] locscout_llm::LlmError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {endpoint}")]
    UnexpectedStatus { status: u16, endpoint: &'static str },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("response is missing {0}")]
    MissingField(&'static str),

    #[error("invalid URL for {endpoint}: {reason}")]
    InvalidUrl { endpoint: &'static str, reason: String },
}
