use thiserror::Error;

/// Errors returned by text-completion providers.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-2xx status.
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The provider answered 200 but produced no text.
    #[error("provider returned an empty completion")]
    EmptyResponse,

    /// No JSON value of the expected shape was found in the completion text.
    #[error("no JSON {0} found in completion")]
    NoJson(&'static str),
}
