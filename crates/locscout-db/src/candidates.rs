//! Storage seam for location candidates.
//!
//! Every record carries a version that increases by one on each successful
//! update. Writers read a record, plan a [`CandidatePatch`] against it and hand
//! the patch back together with the version they read; the store applies it
//! only if nobody wrote in between, otherwise it reports
//! [`DbError::VersionConflict`] and the caller re-reads.

use async_trait::async_trait;
use locscout_core::{CandidatePatch, LocationCandidate};
use serde::Serialize;
use uuid::Uuid;

use crate::DbError;

/// A candidate as persisted, with its optimistic-concurrency version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredCandidate {
    #[serde(flatten)]
    pub candidate: LocationCandidate,
    pub version: i64,
}

#[async_trait]
pub trait CandidateRepository: Send + Sync {
    /// # Errors
    ///
    /// [`DbError::NotFound`] when no candidate has this id.
    async fn get(&self, id: Uuid) -> Result<StoredCandidate, DbError>;

    /// Stores new candidates at version 1. Ids that already exist are left
    /// untouched; returns how many records were inserted.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on storage failure.
    async fn create_many(&self, candidates: &[LocationCandidate]) -> Result<usize, DbError>;

    /// Applies `patch` if the stored version still equals `expected_version`.
    ///
    /// # Errors
    ///
    /// [`DbError::NotFound`] for an unknown id, [`DbError::VersionConflict`]
    /// when the record changed since it was read.
    async fn update(
        &self,
        id: Uuid,
        patch: &CandidatePatch,
        expected_version: i64,
    ) -> Result<StoredCandidate, DbError>;

    /// Candidates for one scene, best match first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on storage failure.
    async fn list_for_scene(&self, scene_id: Uuid) -> Result<Vec<StoredCandidate>, DbError>;
}

/// Best match first; ties keep insertion order.
pub(crate) fn sort_stored(candidates: &mut [StoredCandidate]) {
    candidates.sort_by(|a, b| b.candidate.match_score.total_cmp(&a.candidate.match_score));
}
