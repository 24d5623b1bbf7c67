//! Bounded-concurrency grounding of many requirements.
//!
//! Each requirement runs in its own task behind a semaphore. Workers report to
//! a single collector task over a bounded channel; the collector is the only
//! writer of events and of the progress counter, so progress is monotonic and
//! every requirement yields exactly one `scene_complete`.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use locscout_core::{AppConfig, GroundingResult, LocationRequirement};
use tokio::sync::{mpsc, Semaphore};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::agent::SceneGrounder;
use crate::events::{GroundingEvent, RunSummary};

pub const CANCELLED_ERROR: &str = "cancelled";

#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Default bound on requirements in flight.
    pub max_concurrent: usize,
    /// Hard ceiling on the bound, whatever the caller asks for.
    pub worker_cap: usize,
    /// Capacity of the worker and event channels.
    pub channel_capacity: usize,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            worker_cap: 10,
            channel_capacity: 64,
        }
    }
}

impl PoolOptions {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_concurrent: config.grounding_max_concurrent,
            worker_cap: config.grounding_worker_cap,
            ..Self::default()
        }
    }
}

pub struct GroundingPool {
    grounder: Arc<dyn SceneGrounder>,
    options: PoolOptions,
}

enum WorkerMessage {
    Started(usize),
    Finished(usize, GroundingResult),
}

/// Every requirement's result, in input order, plus the terminal summary.
#[derive(Debug, Clone, Default)]
pub struct PoolOutcome {
    pub results: Vec<GroundingResult>,
    pub summary: RunSummary,
}

/// Handle to a running batch. Dropping it (or the stream made from it)
/// cancels the outstanding work.
pub struct GroundingRun {
    events: mpsc::Receiver<GroundingEvent>,
    cancel: CancellationToken,
}

impl GroundingRun {
    pub async fn next(&mut self) -> Option<GroundingEvent> {
        self.events.recv().await
    }

    /// Requests cancellation. Unfinished requirements complete with a
    /// `cancelled` error and the run still ends with `complete`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn into_stream(self) -> ReceiverStream<GroundingEvent> {
        ReceiverStream::new(self.events)
    }

    /// Drains the run and gathers results back into input order.
    pub async fn collect(mut self) -> PoolOutcome {
        let mut indexed = Vec::new();
        let mut summary = RunSummary::default();
        while let Some(event) = self.events.recv().await {
            match event {
                GroundingEvent::SceneComplete { index, result } => indexed.push((index, *result)),
                GroundingEvent::Complete(s) => summary = s,
                _ => {}
            }
        }
        indexed.sort_by_key(|(index, _)| *index);
        PoolOutcome {
            results: indexed.into_iter().map(|(_, result)| result).collect(),
            summary,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

impl GroundingPool {
    #[must_use]
    pub fn new(grounder: Arc<dyn SceneGrounder>, options: PoolOptions) -> Self {
        Self { grounder, options }
    }

    #[must_use]
    pub fn options(&self) -> &PoolOptions {
        &self.options
    }

    /// Starts a run bounded by [`PoolOptions::max_concurrent`].
    #[must_use]
    pub fn process(&self, requirements: Vec<LocationRequirement>) -> GroundingRun {
        self.process_with_bound(requirements, self.options.max_concurrent)
    }

    /// Starts a run with at most `min(bound, worker_cap, len)` requirements in
    /// flight. Must be called inside a Tokio runtime.
    #[must_use]
    pub fn process_with_bound(&self, requirements: Vec<LocationRequirement>, bound: usize) -> GroundingRun {
        let total = requirements.len();
        let workers_used = bound.max(1).min(self.options.worker_cap.max(1)).min(total);
        let capacity = self.options.channel_capacity.max(1);

        let (event_tx, event_rx) = mpsc::channel(capacity);
        let (worker_tx, worker_rx) = mpsc::channel(capacity);
        let cancel = CancellationToken::new();
        let requirements = Arc::new(requirements);
        let semaphore = Arc::new(Semaphore::new(workers_used.max(1)));

        tracing::info!(total, workers_used, "starting grounding run");

        for index in 0..total {
            let grounder = Arc::clone(&self.grounder);
            let requirements = Arc::clone(&requirements);
            let semaphore = Arc::clone(&semaphore);
            let worker_tx = worker_tx.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let permit = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return,
                    permit = semaphore.acquire_owned() => permit,
                };
                let Ok(_permit) = permit else {
                    return;
                };
                if worker_tx.send(WorkerMessage::Started(index)).await.is_err() {
                    return;
                }
                let requirement = &requirements[index];
                let work = AssertUnwindSafe(grounder.ground(requirement)).catch_unwind();
                let outcome = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return,
                    outcome = work => outcome,
                };
                let result = outcome.unwrap_or_else(|payload| {
                    let message = panic_message(payload.as_ref());
                    tracing::error!(scene = %requirement.scene_header, panic = %message, "grounding worker panicked");
                    GroundingResult::failed(requirement, format!("worker panicked: {message}"))
                });
                let _ = worker_tx.send(WorkerMessage::Finished(index, result)).await;
            });
        }
        drop(worker_tx);

        let collector = Collector {
            requirements,
            events: event_tx,
            cancel: cancel.clone(),
            started: Instant::now(),
            finished: vec![false; total],
            summary: RunSummary {
                total,
                workers_used,
                ..RunSummary::default()
            },
            processed: 0,
        };
        tokio::spawn(collector.run(worker_rx));

        GroundingRun {
            events: event_rx,
            cancel,
        }
    }
}

/// Receiver gone; nobody is listening any more.
struct Disconnected;

struct Collector {
    requirements: Arc<Vec<LocationRequirement>>,
    events: mpsc::Sender<GroundingEvent>,
    cancel: CancellationToken,
    started: Instant,
    finished: Vec<bool>,
    summary: RunSummary,
    processed: usize,
}

impl Collector {
    async fn run(mut self, mut workers: mpsc::Receiver<WorkerMessage>) {
        if self.drive(&mut workers).await.is_err() {
            tracing::info!("grounding event receiver dropped, cancelling run");
            self.cancel.cancel();
        }
    }

    async fn drive(&mut self, workers: &mut mpsc::Receiver<WorkerMessage>) -> Result<(), Disconnected> {
        let total = self.summary.total;
        let cancel = self.cancel.clone();
        let events = self.events.clone();
        while self.processed < total {
            let next = tokio::select! {
                biased;
                () = events.closed() => return Err(Disconnected),
                () = cancel.cancelled() => None,
                message = workers.recv() => Some(message),
            };
            match next {
                None => {
                    while let Ok(message) = workers.try_recv() {
                        if let WorkerMessage::Finished(index, result) = message {
                            self.record(index, result).await?;
                        }
                    }
                    self.cancel_remaining().await?;
                    break;
                }
                Some(Some(WorkerMessage::Started(index))) => {
                    let requirement = &self.requirements[index];
                    let event = GroundingEvent::SceneStart {
                        index,
                        scene_id: requirement.id,
                        scene_header: requirement.scene_header.clone(),
                    };
                    self.emit(event).await?;
                }
                Some(Some(WorkerMessage::Finished(index, result))) => {
                    self.record(index, result).await?;
                }
                // Every worker exited without finishing; only happens on cancellation.
                Some(None) => {
                    self.cancel_remaining().await?;
                    break;
                }
            }
        }

        self.summary.elapsed_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            total = self.summary.total,
            succeeded = self.summary.succeeded,
            failed = self.summary.failed,
            cancelled = self.summary.cancelled,
            candidates = self.summary.total_candidates,
            elapsed_ms = self.summary.elapsed_ms,
            "grounding run complete"
        );
        self.emit(GroundingEvent::Complete(self.summary.clone())).await
    }

    async fn emit(&self, event: GroundingEvent) -> Result<(), Disconnected> {
        self.events.send(event).await.map_err(|_| Disconnected)
    }

    async fn record(&mut self, index: usize, result: GroundingResult) -> Result<(), Disconnected> {
        if std::mem::replace(&mut self.finished[index], true) {
            return Ok(());
        }
        let scene_id = result.scene_id;
        if result.is_success() {
            self.summary.succeeded += 1;
        } else {
            self.summary.failed += 1;
        }
        self.summary.total_candidates += result.candidates.len();

        for candidate in &result.candidates {
            self.emit(GroundingEvent::Candidate {
                index,
                scene_id,
                candidate: Box::new(candidate.clone()),
            })
            .await?;
        }
        for message in &result.errors {
            self.emit(GroundingEvent::Error {
                index,
                scene_id,
                message: message.clone(),
            })
            .await?;
        }
        self.emit(GroundingEvent::SceneComplete {
            index,
            result: Box::new(result),
        })
        .await?;

        self.processed += 1;
        self.emit(GroundingEvent::progress(self.processed, self.summary.total))
            .await
    }

    async fn cancel_remaining(&mut self) -> Result<(), Disconnected> {
        let pending: Vec<usize> = (0..self.finished.len())
            .filter(|&i| !self.finished[i])
            .collect();
        if !pending.is_empty() {
            self.summary.cancelled = true;
        }
        for index in pending {
            let result = GroundingResult::failed(&self.requirements[index], CANCELLED_ERROR);
            self.record(index, result).await?;
        }
        Ok(())
    }
}
