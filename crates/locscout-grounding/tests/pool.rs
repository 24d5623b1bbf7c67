mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{requirements, Behaviour, FakeGrounder};
use locscout_grounding::pool::CANCELLED_ERROR;
use locscout_grounding::{GroundingEvent, GroundingPool, PoolOptions};

fn pool(grounder: std::sync::Arc<FakeGrounder>, worker_cap: usize) -> GroundingPool {
    GroundingPool::new(
        grounder,
        PoolOptions {
            max_concurrent: 5,
            worker_cap,
            channel_capacity: 8,
        },
    )
}

async fn drain(mut run: locscout_grounding::GroundingRun) -> Vec<GroundingEvent> {
    let mut events = Vec::new();
    while let Some(event) = run.next().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn five_requirements_bound_two_one_failure() {
    let grounder = FakeGrounder::new(Duration::from_millis(20), |req| {
        if req.scene_header == "INT. SET 3" {
            Behaviour::Fail
        } else {
            Behaviour::Succeed { candidates: 2 }
        }
    });
    let reqs = requirements(5);
    let ids: Vec<_> = reqs.iter().map(|r| r.id).collect();
    let events = drain(pool(grounder.clone(), 10).process_with_bound(reqs, 2)).await;

    assert!(grounder.max_in_flight.load(Ordering::SeqCst) <= 2);
    assert_eq!(grounder.calls.load(Ordering::SeqCst), 5);

    let starts = events
        .iter()
        .filter(|e| matches!(e, GroundingEvent::SceneStart { .. }))
        .count();
    let completes: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            GroundingEvent::SceneComplete { result, .. } => Some(result),
            _ => None,
        })
        .collect();
    let candidates = events
        .iter()
        .filter(|e| matches!(e, GroundingEvent::Candidate { .. }))
        .count();
    let errors: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            GroundingEvent::Error { message, scene_id, .. } => Some((message.as_str(), *scene_id)),
            _ => None,
        })
        .collect();

    assert_eq!(starts, 5);
    assert_eq!(completes.len(), 5);
    assert_eq!(candidates, 8);
    assert_eq!(errors, [("search provider unavailable", ids[2])]);

    let Some(GroundingEvent::Complete(summary)) = events.last() else {
        panic!("last event must be complete, got {:?}", events.last());
    };
    assert_eq!(summary.total, 5);
    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.total_candidates, 8);
    assert_eq!(summary.workers_used, 2);
    assert!(!summary.cancelled);
}

#[tokio::test]
async fn progress_is_monotonic_and_reaches_total() {
    let grounder = FakeGrounder::new(Duration::from_millis(5), |_| Behaviour::Succeed { candidates: 1 });
    let events = drain(pool(grounder, 10).process_with_bound(requirements(6), 3)).await;

    let progress: Vec<(usize, u8)> = events
        .iter()
        .filter_map(|e| match e {
            GroundingEvent::Progress { processed, percent, total } => {
                assert_eq!(*total, 6);
                Some((*processed, *percent))
            }
            _ => None,
        })
        .collect();
    let processed: Vec<usize> = progress.iter().map(|(p, _)| *p).collect();
    assert_eq!(processed, [1, 2, 3, 4, 5, 6]);
    assert!(progress.windows(2).all(|w| w[0].1 <= w[1].1));
    assert_eq!(progress.last().map(|(_, pct)| *pct), Some(100));
}

#[tokio::test]
async fn every_call_failing_with_bound_one_still_yields_one_result_each() {
    let grounder = FakeGrounder::new(Duration::from_millis(1), |_| Behaviour::Fail);
    let reqs = requirements(4);
    let ids: Vec<_> = reqs.iter().map(|r| r.id).collect();
    let outcome = pool(grounder.clone(), 10).process_with_bound(reqs, 1).collect().await;

    assert_eq!(outcome.results.len(), 4);
    assert_eq!(grounder.max_in_flight.load(Ordering::SeqCst), 1);
    let result_ids: Vec<_> = outcome.results.iter().map(|r| r.scene_id).collect();
    assert_eq!(result_ids, ids);
    assert!(outcome.results.iter().all(|r| !r.is_success()));
    assert_eq!(outcome.summary.failed, 4);
    assert_eq!(outcome.summary.workers_used, 1);
}

#[tokio::test]
async fn zero_requirements_complete_immediately() {
    let grounder = FakeGrounder::new(Duration::ZERO, |_| Behaviour::Fail);
    let events = drain(pool(grounder.clone(), 10).process(Vec::new())).await;

    assert_eq!(events.len(), 1);
    let GroundingEvent::Complete(summary) = &events[0] else {
        panic!("expected complete, got {:?}", events[0]);
    };
    assert_eq!(summary.total, 0);
    assert_eq!(summary.workers_used, 0);
    assert_eq!(grounder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn a_panicking_scene_is_isolated() {
    let grounder = FakeGrounder::new(Duration::from_millis(1), |req| {
        if req.scene_header == "INT. SET 2" {
            Behaviour::Panic
        } else {
            Behaviour::Succeed { candidates: 1 }
        }
    });
    let outcome = pool(grounder, 10).process_with_bound(requirements(3), 3).collect().await;

    assert_eq!(outcome.results.len(), 3);
    assert!(outcome.results[0].is_success());
    assert!(outcome.results[2].is_success());
    let failed = &outcome.results[1];
    assert_eq!(failed.errors.len(), 1);
    assert!(failed.errors[0].contains("grounder exploded"), "{:?}", failed.errors);
    assert_eq!(outcome.summary.succeeded, 2);
    assert_eq!(outcome.summary.failed, 1);
}

#[tokio::test]
async fn worker_cap_limits_the_bound() {
    let grounder = FakeGrounder::new(Duration::from_millis(10), |_| Behaviour::Succeed { candidates: 0 });
    let outcome = pool(grounder.clone(), 3).process_with_bound(requirements(8), 50).collect().await;

    assert_eq!(outcome.summary.workers_used, 3);
    assert!(grounder.max_in_flight.load(Ordering::SeqCst) <= 3);
    assert_eq!(outcome.results.len(), 8);
}

#[tokio::test]
async fn cancellation_reports_unfinished_scenes_as_cancelled() {
    let grounder = FakeGrounder::new(Duration::ZERO, |req| {
        if req.scene_header == "INT. SET 1" {
            Behaviour::Succeed { candidates: 1 }
        } else {
            Behaviour::Hang
        }
    });
    let mut run = pool(grounder, 10).process_with_bound(requirements(4), 1);

    // Wait for the first scene to finish, then cancel while the second hangs.
    loop {
        match run.next().await {
            Some(GroundingEvent::SceneComplete { index, .. }) => {
                assert_eq!(index, 0);
                break;
            }
            Some(_) => {}
            None => panic!("run ended before the first scene completed"),
        }
    }
    run.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(5), run.collect())
        .await
        .expect("cancelled run must finish promptly");
    // The first result was consumed above; the rest are cancelled.
    assert_eq!(outcome.results.len(), 3);
    assert!(outcome
        .results
        .iter()
        .all(|r| r.errors == [CANCELLED_ERROR.to_string()]));
    assert!(outcome.summary.cancelled);
    assert_eq!(outcome.summary.total, 4);
    assert_eq!(outcome.summary.succeeded, 1);
    assert_eq!(outcome.summary.failed, 3);
}

#[tokio::test]
async fn dropping_the_run_cancels_outstanding_work() {
    let grounder = FakeGrounder::new(Duration::ZERO, |_| Behaviour::Hang);
    let mut run = pool(grounder.clone(), 10).process_with_bound(requirements(3), 1);
    let token = run.cancel_token();

    let first = run.next().await;
    assert!(matches!(first, Some(GroundingEvent::SceneStart { index: 0, .. })));
    drop(run);

    tokio::time::timeout(Duration::from_secs(5), token.cancelled())
        .await
        .expect("dropping the run cancels it");
    assert_eq!(grounder.calls.load(Ordering::SeqCst), 1);
}
