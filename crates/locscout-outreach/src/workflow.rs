use std::sync::Arc;

use chrono::Utc;
use locscout_core::{lifecycle, CandidateStatus, LifecycleEvent, LocationCandidate, Transition};
use locscout_db::{CandidateRepository, DbError, StoredCandidate};
use serde::Serialize;
use uuid::Uuid;

use crate::error::OutreachError;
use crate::webhook::WebhookEvent;

pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// Result of driving one lifecycle event through the store.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowOutcome {
    pub candidate: StoredCandidate,
    pub transition: Transition,
}

impl WorkflowOutcome {
    #[must_use]
    pub fn changed(&self) -> bool {
        !matches!(self.transition, Transition::Unchanged(_))
    }
}

/// Acknowledgement returned to the webhook caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookAck {
    pub kind: String,
    pub updated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CandidateStatus>,
}

/// Applies lifecycle events to stored candidates.
///
/// Each event is planned against the freshly read record and written back
/// under the version that was read. A concurrent writer makes the write fail
/// with a version conflict, and the event is re-planned against the newer
/// record, up to `max_attempts` times.
#[derive(Clone)]
pub struct CandidateWorkflow {
    repo: Arc<dyn CandidateRepository>,
    max_attempts: usize,
}

impl CandidateWorkflow {
    #[must_use]
    pub fn new(repo: Arc<dyn CandidateRepository>) -> Self {
        Self {
            repo,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    #[must_use]
    pub fn repository(&self) -> &Arc<dyn CandidateRepository> {
        &self.repo
    }

    /// # Errors
    ///
    /// Returns [`OutreachError::Db`] on storage failure.
    pub async fn get(&self, id: Uuid) -> Result<StoredCandidate, OutreachError> {
        Ok(self.repo.get(id).await?)
    }

    /// # Errors
    ///
    /// Returns [`OutreachError::Db`] on storage failure.
    pub async fn list_for_scene(&self, scene_id: Uuid) -> Result<Vec<StoredCandidate>, OutreachError> {
        Ok(self.repo.list_for_scene(scene_id).await?)
    }

    /// Stores freshly grounded candidates; existing ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`OutreachError::Db`] on storage failure.
    pub async fn store(&self, candidates: &[LocationCandidate]) -> Result<usize, OutreachError> {
        Ok(self.repo.create_many(candidates).await?)
    }

    /// # Errors
    ///
    /// - [`OutreachError::Lifecycle`] when the event is not allowed in the current state.
    /// - [`OutreachError::Contended`] when every attempt lost a version race.
    /// - [`OutreachError::Db`] for unknown ids and storage failures.
    pub async fn apply_event(
        &self,
        id: Uuid,
        event: &LifecycleEvent,
    ) -> Result<WorkflowOutcome, OutreachError> {
        for attempt in 1..=self.max_attempts {
            let stored = self.repo.get(id).await?;
            let from = stored.candidate.status;
            let Some(patch) = lifecycle::plan(&stored.candidate, event, Utc::now())? else {
                tracing::debug!(candidate = %id, event = event.name(), status = %from, "event is a no-op");
                return Ok(WorkflowOutcome {
                    candidate: stored,
                    transition: Transition::Unchanged(from),
                });
            };

            match self.repo.update(id, &patch, stored.version).await {
                Ok(updated) => {
                    let to = updated.candidate.status;
                    let transition = if to == from {
                        Transition::Updated(from)
                    } else {
                        Transition::Moved { from, to }
                    };
                    tracing::info!(
                        candidate = %id,
                        event = event.name(),
                        from = %from,
                        to = %to,
                        version = updated.version,
                        "candidate updated"
                    );
                    return Ok(WorkflowOutcome {
                        candidate: updated,
                        transition,
                    });
                }
                Err(DbError::VersionConflict { actual, .. }) => {
                    tracing::debug!(candidate = %id, attempt, actual, "version conflict, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(candidate = %id, event = event.name(), attempts = self.max_attempts, "giving up on contended candidate");
        Err(OutreachError::Contended {
            id,
            attempts: self.max_attempts,
        })
    }

    /// # Errors
    ///
    /// See [`CandidateWorkflow::apply_event`].
    pub async fn queue_call(
        &self,
        id: Uuid,
        call_id: Option<String>,
    ) -> Result<WorkflowOutcome, OutreachError> {
        self.apply_event(id, &LifecycleEvent::CallQueued { call_id })
            .await
    }

    /// # Errors
    ///
    /// See [`CandidateWorkflow::apply_event`].
    pub async fn submit_for_review(&self, id: Uuid) -> Result<WorkflowOutcome, OutreachError> {
        self.apply_event(id, &LifecycleEvent::SubmitForReview).await
    }

    /// # Errors
    ///
    /// See [`CandidateWorkflow::apply_event`].
    pub async fn approve(
        &self,
        id: Uuid,
        approved_by: Option<String>,
    ) -> Result<WorkflowOutcome, OutreachError> {
        self.apply_event(id, &LifecycleEvent::Approve { approved_by })
            .await
    }

    /// # Errors
    ///
    /// See [`CandidateWorkflow::apply_event`].
    pub async fn reject(
        &self,
        id: Uuid,
        reason: Option<String>,
    ) -> Result<WorkflowOutcome, OutreachError> {
        self.apply_event(id, &LifecycleEvent::Reject { reason }).await
    }

    /// # Errors
    ///
    /// See [`CandidateWorkflow::apply_event`].
    pub async fn book(
        &self,
        id: Uuid,
        booking_id: impl Into<String>,
    ) -> Result<WorkflowOutcome, OutreachError> {
        self.apply_event(
            id,
            &LifecycleEvent::Book {
                booking_id: booking_id.into(),
            },
        )
        .await
    }

    /// Applies a parsed webhook. Ignored webhooks and late or replayed call
    /// events are acknowledged with `updated: false`.
    ///
    /// # Errors
    ///
    /// See [`CandidateWorkflow::apply_event`].
    pub async fn handle_webhook(&self, webhook: WebhookEvent) -> Result<WebhookAck, OutreachError> {
        let kind = match &webhook {
            WebhookEvent::StatusUpdate { .. } => "status-update".to_string(),
            WebhookEvent::EndOfCallReport { .. } => "end-of-call-report".to_string(),
            WebhookEvent::Ignored { kind } => kind.clone(),
        };
        let Some((id, event)) = webhook.into_lifecycle() else {
            return Ok(WebhookAck {
                kind,
                updated: false,
                candidate_id: None,
                status: None,
            });
        };

        let outcome = self.apply_event(id, &event).await?;
        Ok(WebhookAck {
            kind,
            updated: outcome.changed(),
            candidate_id: Some(id),
            status: Some(outcome.candidate.candidate.status),
        })
    }
}
