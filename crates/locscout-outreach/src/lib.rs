//! Candidate outreach: provider webhooks and the review workflow on top of
//! the candidate store.

pub mod error;
pub mod webhook;
pub mod workflow;

pub use error::OutreachError;
pub use webhook::{parse_webhook, verify_secret, WebhookEvent, SECRET_HEADER};
pub use workflow::{CandidateWorkflow, WebhookAck, WorkflowOutcome, DEFAULT_MAX_ATTEMPTS};
