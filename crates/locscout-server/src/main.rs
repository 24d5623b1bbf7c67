mod api;
mod middleware;

use std::sync::Arc;

use locscout_core::{AppConfig, Environment};
use locscout_db::{CandidateRepository, MemoryCandidateRepository, PgCandidateRepository};
use locscout_grounding::{GroundingAgent, GroundingPool, PoolOptions};
use locscout_llm::{ChatClient, TextCompletion};
use locscout_outreach::CandidateWorkflow;
use locscout_scenes::{AnalysisOptions, DedupEngine};
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = locscout_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::info!(env = %config.env, bind_addr = %config.bind_addr, "starting locscout-server");

    let (pool, repo) = candidate_store(&config).await?;

    let llm: Arc<dyn TextCompletion> = Arc::new(
        ChatClient::new(
            &config.llm_base_url,
            &config.llm_api_key,
            &config.llm_model,
            config.request_timeout_secs,
        )?
        .with_retry(config.llm_max_retries, config.retry_backoff_base_ms),
    );
    let agent = GroundingAgent::from_config(Arc::clone(&llm), &config)?;
    let grounding = GroundingPool::new(Arc::new(agent), PoolOptions::from_app_config(&config));

    if config.vapi_webhook_secret.is_none() {
        tracing::warn!("VAPI_WEBHOOK_SECRET not set; webhook secret check disabled");
    }

    let state = AppState {
        pool,
        dedup: Arc::new(DedupEngine::new(Arc::clone(&llm))),
        analysis: AnalysisOptions::from_app_config(&config, ""),
        llm,
        grounding: Arc::new(grounding),
        workflow: CandidateWorkflow::new(repo),
        webhook_secret: config.vapi_webhook_secret.as_deref().map(Arc::from),
    };
    let auth = AuthState::from_env(matches!(config.env, Environment::Development))?;
    let app = build_app(state, auth);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Postgres when `DATABASE_URL` is set, otherwise an in-memory store that
/// lives as long as the process.
async fn candidate_store(
    config: &AppConfig,
) -> anyhow::Result<(Option<PgPool>, Arc<dyn CandidateRepository>)> {
    if config.database_url.is_none() {
        tracing::warn!("DATABASE_URL not set; candidates are kept in memory");
        return Ok((None, Arc::new(MemoryCandidateRepository::new())));
    }

    let pool = locscout_db::connect_pool_from_config(config).await?;
    let applied = locscout_db::run_migrations(&pool).await?;
    tracing::info!(applied, "database migrations complete");
    Ok((
        Some(pool.clone()),
        Arc::new(PgCandidateRepository::new(pool)),
    ))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
