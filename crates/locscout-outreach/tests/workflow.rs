use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use locscout_core::{
    lifecycle, CandidatePatch, CandidateStatus, LifecycleError, LocationCandidate, Transition,
    VapiCallStatus,
};
use locscout_db::{CandidateRepository, DbError, MemoryCandidateRepository, StoredCandidate};
use locscout_outreach::{parse_webhook, CandidateWorkflow, OutreachError};
use serde_json::json;
use uuid::Uuid;

fn candidate(phone: Option<&str>) -> LocationCandidate {
    let mut c = LocationCandidate::new(Uuid::new_v4(), "proj", "Iron Works");
    c.phone_number = phone.map(ToString::to_string);
    lifecycle::initialize(&mut c);
    c
}

async fn workflow_with(c: &LocationCandidate) -> CandidateWorkflow {
    let repo = Arc::new(MemoryCandidateRepository::new());
    repo.create_many(std::slice::from_ref(c)).await.unwrap();
    CandidateWorkflow::new(repo)
}

fn status_webhook(id: Uuid, status: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "message": {
            "type": "status-update",
            "status": status,
            "call": {"id": "call-1", "metadata": {"candidate_id": id.to_string()}}
        }
    }))
    .unwrap()
}

fn report_webhook(id: Uuid) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "message": {
            "type": "end-of-call-report",
            "call": {"id": "call-1", "duration": 95.0, "metadata": {"candidate_id": id.to_string()}},
            "analysis": {
                "summary": "Open Saturdays.",
                "structuredData": {"venue_available": true, "price_quoted": 800, "red_flags": ["strict noise curfew"]}
            }
        }
    }))
    .unwrap()
}

#[tokio::test]
async fn call_flow_through_booking() {
    let c = candidate(Some("+1 404 555 0100"));
    let workflow = workflow_with(&c).await;

    let queued = workflow.queue_call(c.id, Some("call-1".to_string())).await.unwrap();
    assert_eq!(
        queued.transition,
        Transition::Moved {
            from: CandidateStatus::Discovered,
            to: CandidateStatus::CallPending
        }
    );

    let ack = workflow
        .handle_webhook(parse_webhook(&status_webhook(c.id, "ringing")).unwrap())
        .await
        .unwrap();
    assert!(ack.updated);
    assert_eq!(ack.status, Some(CandidateStatus::CallInProgress));

    let ack = workflow
        .handle_webhook(parse_webhook(&report_webhook(c.id)).unwrap())
        .await
        .unwrap();
    assert_eq!(ack.kind, "end-of-call-report");
    assert_eq!(ack.status, Some(CandidateStatus::CallCompleted));

    let stored = workflow.get(c.id).await.unwrap();
    assert_eq!(stored.candidate.vapi_call_status, VapiCallStatus::Completed);
    assert_eq!(stored.candidate.venue_available, Some(true));
    assert_eq!(stored.candidate.call_summary.as_deref(), Some("Open Saturdays."));
    assert!(stored
        .candidate
        .red_flags
        .contains(&"strict noise curfew".to_string()));

    workflow.submit_for_review(c.id).await.unwrap();
    let approved = workflow.approve(c.id, Some("ana".to_string())).await.unwrap();
    assert_eq!(approved.candidate.candidate.status, CandidateStatus::Approved);
    assert_eq!(approved.candidate.candidate.approved_by.as_deref(), Some("ana"));

    let booked = workflow.book(c.id, "BK-7").await.unwrap();
    assert_eq!(booked.candidate.candidate.status, CandidateStatus::Booked);
    assert_eq!(booked.candidate.candidate.booking_id.as_deref(), Some("BK-7"));
    // Six writes after creation.
    assert_eq!(booked.candidate.version, 7);
}

#[tokio::test]
async fn replays_and_late_events_are_acknowledged_without_change() {
    let c = candidate(Some("+1 404 555 0100"));
    let workflow = workflow_with(&c).await;

    let ringing = parse_webhook(&status_webhook(c.id, "ringing")).unwrap();
    assert!(workflow.handle_webhook(ringing.clone()).await.unwrap().updated);
    assert!(!workflow.handle_webhook(ringing).await.unwrap().updated);

    workflow
        .handle_webhook(parse_webhook(&status_webhook(c.id, "ended")).unwrap())
        .await
        .unwrap();
    workflow.approve(c.id, None).await.unwrap();

    let late = workflow
        .handle_webhook(parse_webhook(&status_webhook(c.id, "in-progress")).unwrap())
        .await
        .unwrap();
    assert!(!late.updated);
    assert_eq!(late.status, Some(CandidateStatus::Approved));
}

#[tokio::test]
async fn late_queued_webhook_does_not_regress_a_ringing_call() {
    let c = candidate(Some("+1 404 555 0100"));
    let workflow = workflow_with(&c).await;

    let queued = parse_webhook(&status_webhook(c.id, "queued")).unwrap();
    let ack = workflow.handle_webhook(queued.clone()).await.unwrap();
    assert!(ack.updated);
    assert_eq!(ack.status, Some(CandidateStatus::CallPending));

    workflow
        .handle_webhook(parse_webhook(&status_webhook(c.id, "ringing")).unwrap())
        .await
        .unwrap();

    let late = workflow.handle_webhook(queued).await.unwrap();
    assert!(!late.updated);
    assert_eq!(late.status, Some(CandidateStatus::CallInProgress));
    let stored = workflow.get(c.id).await.unwrap();
    assert_eq!(stored.candidate.vapi_call_status, VapiCallStatus::Ringing);
}

#[tokio::test]
async fn ignored_webhooks_touch_nothing() {
    let c = candidate(Some("+1 404 555 0100"));
    let workflow = workflow_with(&c).await;
    let body = serde_json::to_vec(&json!({"message": {"type": "transcript"}})).unwrap();

    let ack = workflow
        .handle_webhook(parse_webhook(&body).unwrap())
        .await
        .unwrap();
    assert!(!ack.updated);
    assert_eq!(ack.kind, "transcript");
    assert_eq!(workflow.get(c.id).await.unwrap().version, 1);
}

#[tokio::test]
async fn no_phone_candidates_refuse_calls_but_can_be_reviewed() {
    let c = candidate(None);
    assert_eq!(c.status, CandidateStatus::HumanReview);
    let workflow = workflow_with(&c).await;

    let err = workflow.queue_call(c.id, None).await.unwrap_err();
    assert!(matches!(
        err,
        OutreachError::Lifecycle(LifecycleError::NoPhoneNumber)
    ));

    let rejected = workflow
        .reject(c.id, Some("no way to reach them".to_string()))
        .await
        .unwrap();
    assert_eq!(rejected.candidate.candidate.status, CandidateStatus::Rejected);
}

#[tokio::test]
async fn approval_requires_review_state() {
    let c = candidate(Some("+1 404 555 0100"));
    let workflow = workflow_with(&c).await;
    let err = workflow.approve(c.id, None).await.unwrap_err();
    assert!(matches!(
        err,
        OutreachError::Lifecycle(LifecycleError::InvalidTransition {
            from: CandidateStatus::Discovered,
            ..
        })
    ));
}

#[tokio::test]
async fn unknown_candidate_is_not_found() {
    let workflow = CandidateWorkflow::new(Arc::new(MemoryCandidateRepository::new()));
    let err = workflow.approve(Uuid::new_v4(), None).await.unwrap_err();
    assert!(err.is_not_found());
}

/// Lets another writer slip in before the first update it sees.
struct RacingRepository {
    inner: MemoryCandidateRepository,
    raced: AtomicUsize,
}

#[async_trait]
impl CandidateRepository for RacingRepository {
    async fn get(&self, id: Uuid) -> Result<StoredCandidate, DbError> {
        self.inner.get(id).await
    }

    async fn create_many(&self, candidates: &[LocationCandidate]) -> Result<usize, DbError> {
        self.inner.create_many(candidates).await
    }

    async fn update(
        &self,
        id: Uuid,
        patch: &CandidatePatch,
        expected_version: i64,
    ) -> Result<StoredCandidate, DbError> {
        if self.raced.fetch_add(1, Ordering::SeqCst) == 0 {
            let other = CandidatePatch {
                append_red_flags: vec!["edited elsewhere".to_string()],
                ..CandidatePatch::default()
            };
            self.inner.update(id, &other, expected_version).await?;
        }
        self.inner.update(id, patch, expected_version).await
    }

    async fn list_for_scene(&self, scene_id: Uuid) -> Result<Vec<StoredCandidate>, DbError> {
        self.inner.list_for_scene(scene_id).await
    }
}

#[tokio::test]
async fn version_conflicts_are_retried_against_the_newer_record() {
    let c = candidate(None);
    let repo = Arc::new(RacingRepository {
        inner: MemoryCandidateRepository::new(),
        raced: AtomicUsize::new(0),
    });
    repo.create_many(std::slice::from_ref(&c)).await.unwrap();
    let workflow = CandidateWorkflow::new(repo.clone());

    let outcome = workflow.approve(c.id, Some("ana".to_string())).await.unwrap();
    assert_eq!(outcome.candidate.version, 3);
    assert_eq!(outcome.candidate.candidate.status, CandidateStatus::Approved);
    assert!(outcome
        .candidate
        .candidate
        .red_flags
        .contains(&"edited elsewhere".to_string()));
    assert_eq!(repo.raced.load(Ordering::SeqCst), 2);
}

struct AlwaysStale(MemoryCandidateRepository);

#[async_trait]
impl CandidateRepository for AlwaysStale {
    async fn get(&self, id: Uuid) -> Result<StoredCandidate, DbError> {
        self.0.get(id).await
    }

    async fn create_many(&self, candidates: &[LocationCandidate]) -> Result<usize, DbError> {
        self.0.create_many(candidates).await
    }

    async fn update(
        &self,
        id: Uuid,
        _patch: &CandidatePatch,
        expected_version: i64,
    ) -> Result<StoredCandidate, DbError> {
        Err(DbError::VersionConflict {
            id,
            expected: expected_version,
            actual: expected_version + 1,
        })
    }

    async fn list_for_scene(&self, scene_id: Uuid) -> Result<Vec<StoredCandidate>, DbError> {
        self.0.list_for_scene(scene_id).await
    }
}

#[tokio::test]
async fn persistent_conflicts_give_up() {
    let c = candidate(None);
    let repo = Arc::new(AlwaysStale(MemoryCandidateRepository::new()));
    repo.create_many(std::slice::from_ref(&c)).await.unwrap();
    let workflow = CandidateWorkflow::new(repo).with_max_attempts(2);

    let err = workflow.approve(c.id, None).await.unwrap_err();
    assert!(matches!(err, OutreachError::Contended { attempts: 2, .. }));
}
