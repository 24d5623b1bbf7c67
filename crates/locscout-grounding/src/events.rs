use locscout_core::{GroundingResult, LocationCandidate};
use serde::Serialize;
use uuid::Uuid;

/// Aggregate emitted once, as the last event of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub total_candidates: usize,
    pub workers_used: usize,
    pub elapsed_ms: u64,
}

/// Streamed progress of a grounding run, in completion order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GroundingEvent {
    SceneStart {
        index: usize,
        scene_id: Uuid,
        scene_header: String,
    },
    Candidate {
        index: usize,
        scene_id: Uuid,
        candidate: Box<LocationCandidate>,
    },
    Error {
        index: usize,
        scene_id: Uuid,
        message: String,
    },
    SceneComplete {
        index: usize,
        result: Box<GroundingResult>,
    },
    Progress {
        processed: usize,
        total: usize,
        percent: u8,
    },
    Complete(RunSummary),
}

impl GroundingEvent {
    /// SSE event name; matches the serialized `type` tag.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SceneStart { .. } => "scene_start",
            Self::Candidate { .. } => "candidate",
            Self::Error { .. } => "error",
            Self::SceneComplete { .. } => "scene_complete",
            Self::Progress { .. } => "progress",
            Self::Complete(_) => "complete",
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete(_))
    }

    pub(crate) fn progress(processed: usize, total: usize) -> Self {
        let percent = if total == 0 {
            100
        } else {
            u8::try_from(processed * 100 / total).unwrap_or(100)
        };
        Self::Progress {
            processed,
            total,
            percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_matches_serialized_tag() {
        let events = [
            GroundingEvent::progress(1, 3),
            GroundingEvent::Error {
                index: 0,
                scene_id: Uuid::nil(),
                message: "boom".to_string(),
            },
            GroundingEvent::Complete(RunSummary::default()),
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], event.name());
        }
    }

    #[test]
    fn progress_percent_rounds_down() {
        assert_eq!(
            GroundingEvent::progress(1, 3),
            GroundingEvent::Progress {
                processed: 1,
                total: 3,
                percent: 33
            }
        );
        assert_eq!(
            GroundingEvent::progress(0, 0),
            GroundingEvent::Progress {
                processed: 0,
                total: 0,
                percent: 100
            }
        );
    }

    #[test]
    fn complete_flattens_summary() {
        let json = serde_json::to_value(GroundingEvent::Complete(RunSummary {
            total: 2,
            succeeded: 1,
            failed: 1,
            ..RunSummary::default()
        }))
        .unwrap();
        assert_eq!(json["type"], "complete");
        assert_eq!(json["succeeded"], 1);
        assert_eq!(json["cancelled"], false);
    }
}
