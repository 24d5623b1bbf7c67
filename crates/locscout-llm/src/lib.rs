//! Text-completion seam shared by deduplication, requirement analysis,
//! grounding, and visual verification.

mod client;
mod error;
mod json;
mod retry;

pub use client::{ChatClient, CompletionRequest, TextCompletion};
pub use error::LlmError;
pub use json::{extract_json_array, extract_json_object, strip_code_blocks, truncate_chars};
pub use retry::retry_with_backoff;
