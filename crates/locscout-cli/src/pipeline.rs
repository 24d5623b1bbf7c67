//! Command handlers for the three pipeline stages.
//!
//! Each stage reads the previous stage's output as-is, so
//! `dedup | analyze | ground` can be chained through stdin with `-i -`.
//! Per-scene failures are reported in the output rather than aborting.

use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use futures::StreamExt;
use locscout_core::{AppConfig, LocationRequirement, UniqueLocation};
use locscout_db::{CandidateRepository, PgCandidateRepository};
use locscout_grounding::{GroundingAgent, GroundingEvent, GroundingPool, PoolOptions};
use locscout_llm::{ChatClient, TextCompletion};
use locscout_scenes::{AnalysisOptions, DedupEngine, RequirementAnalyzer};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// A bare array, or the `dedup` output object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum LocationsInput {
    Bare(Vec<UniqueLocation>),
    Wrapped { locations: Vec<UniqueLocation> },
}

impl LocationsInput {
    pub(crate) fn into_inner(self) -> Vec<UniqueLocation> {
        match self {
            Self::Bare(locations) | Self::Wrapped { locations } => locations,
        }
    }
}

/// A bare array, or the `analyze` output object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RequirementsInput {
    Bare(Vec<LocationRequirement>),
    Wrapped { requirements: Vec<LocationRequirement> },
}

impl RequirementsInput {
    pub(crate) fn into_inner(self) -> Vec<LocationRequirement> {
        match self {
            Self::Bare(requirements) | Self::Wrapped { requirements } => requirements,
        }
    }
}

pub(crate) fn parse_json<T: DeserializeOwned>(raw: &str, source: &str) -> anyhow::Result<T> {
    serde_json::from_str(raw).with_context(|| format!("invalid JSON in {source}"))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let (raw, source) = if path.as_os_str() == "-" {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("failed to read stdin")?;
        (raw, "stdin".to_string())
    } else {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        (raw, path.display().to_string())
    };
    parse_json(&raw, &source)
}

fn write_json<T: Serialize>(path: Option<&Path>, value: &T) -> anyhow::Result<()> {
    let mut rendered = serde_json::to_string_pretty(value)?;
    rendered.push('\n');
    match path {
        Some(path) => std::fs::write(path, rendered)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            std::io::stdout().lock().write_all(rendered.as_bytes())?;
            Ok(())
        }
    }
}

fn build_llm(config: &AppConfig) -> anyhow::Result<Arc<dyn TextCompletion>> {
    let client = ChatClient::new(
        &config.llm_base_url,
        &config.llm_api_key,
        &config.llm_model,
        config.request_timeout_secs,
    )
    .context("failed to build LLM client")?
    .with_retry(config.llm_max_retries, config.retry_backoff_base_ms);
    Ok(Arc::new(client))
}

/// Analysis options from config, overridden by command-line flags.
pub(crate) fn analysis_options(
    config: &AppConfig,
    project: &str,
    city: Option<&str>,
    max_results: Option<usize>,
) -> anyhow::Result<AnalysisOptions> {
    let project = project.trim();
    anyhow::ensure!(!project.is_empty(), "--project must not be empty");
    anyhow::ensure!(max_results != Some(0), "--max-results must be at least 1");

    let mut options = AnalysisOptions::from_app_config(config, project);
    if let Some(city) = city.map(str::trim).filter(|c| !c.is_empty()) {
        options.target_city = city.to_string();
    }
    if let Some(max_results) = max_results {
        options.max_results = max_results;
    }
    Ok(options)
}

pub(crate) async fn run_dedup(
    config: &AppConfig,
    input: &Path,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let locations = read_json::<LocationsInput>(input)?.into_inner();
    let engine = DedupEngine::new(build_llm(config)?);
    let outcome = engine.run(locations).await;
    eprintln!(
        "dedup: {} -> {} locations",
        outcome.report.input_count,
        outcome.locations.len()
    );
    write_json(output, &outcome)
}

pub(crate) async fn run_analyze(
    config: &AppConfig,
    options: AnalysisOptions,
    input: &Path,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let locations = read_json::<LocationsInput>(input)?.into_inner();
    let analyzer = RequirementAnalyzer::new(build_llm(config)?, options);
    let batch = analyzer.analyze_all(&locations).await;
    for failure in &batch.failures {
        eprintln!("error: {}: {}", failure.scene_header, failure.error);
    }
    write_json(output, &batch)
}

/// Streams grounding events to stdout as JSON lines, ending with the run
/// summary.
pub(crate) async fn run_ground(
    config: &AppConfig,
    input: &Path,
    max_concurrent: Option<usize>,
    store: bool,
) -> anyhow::Result<()> {
    anyhow::ensure!(max_concurrent != Some(0), "--max-concurrent must be at least 1");
    let requirements = read_json::<RequirementsInput>(input)?.into_inner();

    let repo = if store {
        let pool = locscout_db::connect_pool_from_config(config).await?;
        Some(PgCandidateRepository::new(pool))
    } else {
        None
    };

    let agent = GroundingAgent::from_config(build_llm(config)?, config)?;
    let pool = GroundingPool::new(Arc::new(agent), PoolOptions::from_app_config(config));
    let bound = max_concurrent.unwrap_or(pool.options().max_concurrent);
    tracing::info!(requirements = requirements.len(), bound, "starting grounding run");

    let mut events = pool.process_with_bound(requirements, bound).into_stream();
    while let Some(event) = events.next().await {
        if let (Some(repo), GroundingEvent::SceneComplete { result, .. }) = (&repo, &event) {
            if !result.candidates.is_empty() {
                match repo.create_many(&result.candidates).await {
                    Ok(stored) => tracing::debug!(scene = %result.scene_header, stored, "stored candidates"),
                    Err(e) => {
                        tracing::error!(scene = %result.scene_header, error = %e, "failed to store candidates");
                    }
                }
            }
        }
        let mut line = serde_json::to_string(&event)?;
        line.push('\n');
        std::io::stdout().lock().write_all(line.as_bytes())?;
        if let GroundingEvent::Complete(summary) = &event {
            eprintln!(
                "ground: {}/{} scenes, {} candidates",
                summary.succeeded, summary.total, summary.total_candidates
            );
        }
    }
    std::io::stdout().flush()?;
    Ok(())
}
