use locscout_core::{CoreError, LifecycleError};
use locscout_db::DbError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum OutreachError {
    #[error("webhook payload is not valid JSON: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    #[error("webhook payload is missing {0}")]
    MissingField(&'static str),
    #[error("webhook candidate id is not a UUID: {0}")]
    InvalidCandidateId(String),
    #[error("webhook secret is missing or does not match")]
    Unauthorized,
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("candidate {id} kept changing underneath us; gave up after {attempts} attempts")]
    Contended { id: Uuid, attempts: usize },
}

impl OutreachError {
    /// True when the candidate does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Db(DbError::NotFound(_)))
    }
}
