#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use locscout_core::{GroundingResult, LocationCandidate, LocationRequirement};
use locscout_grounding::SceneGrounder;

pub fn requirement(header: &str) -> LocationRequirement {
    serde_json::from_value(serde_json::json!({
        "project_id": "proj-1",
        "scene_header": header,
        "vibe": {"primary": "industrial", "descriptors": ["rusty"]},
        "constraints": {"interior_exterior": "interior", "time_of_day": "night"},
        "target_city": "Atlanta, GA",
        "max_results": 3
    }))
    .expect("valid requirement")
}

pub fn requirements(n: usize) -> Vec<LocationRequirement> {
    (1..=n).map(|i| requirement(&format!("INT. SET {i}"))).collect()
}

/// What the fake grounder does for a given scene header.
#[derive(Clone, Copy)]
pub enum Behaviour {
    Succeed { candidates: usize },
    Fail,
    Panic,
    Hang,
}

type Script = dyn Fn(&LocationRequirement) -> Behaviour + Send + Sync;

/// Grounder fake that sleeps briefly, then behaves as scripted. Tracks how
/// many calls are in flight at once.
pub struct FakeGrounder {
    script: Box<Script>,
    delay: Duration,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub calls: AtomicUsize,
}

impl FakeGrounder {
    pub fn new<F>(delay: Duration, script: F) -> Arc<Self>
    where
        F: Fn(&LocationRequirement) -> Behaviour + Send + Sync + 'static,
    {
        Arc::new(Self {
            script: Box::new(script),
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SceneGrounder for FakeGrounder {
    async fn ground(&self, requirement: &LocationRequirement) -> GroundingResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let behaviour = (self.script)(requirement);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match behaviour {
            Behaviour::Succeed { candidates } => {
                let mut result = GroundingResult::empty(requirement, "fake query");
                result.candidates = (0..candidates)
                    .map(|i| {
                        LocationCandidate::new(
                            requirement.id,
                            requirement.project_id.clone(),
                            format!("Venue {i}"),
                        )
                    })
                    .collect();
                result.total_found = candidates;
                result
            }
            Behaviour::Fail => GroundingResult::failed(requirement, "search provider unavailable"),
            Behaviour::Panic => panic!("grounder exploded"),
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                GroundingResult::empty(requirement, "never")
            }
        }
    }
}
