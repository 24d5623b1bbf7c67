use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

const DEFAULT_LLM_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
const DEFAULT_LLM_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_VISION_BASE_URL: &str = "https://api.perplexity.ai";
const DEFAULT_VISION_MODEL: &str = "sonar";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can drive it with a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var).ok().filter(|v| !v.trim().is_empty())
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_positive_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        let value = raw
            .parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })?;
        if value == 0 {
            return Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(value)
    };

    let llm_api_key = require("LOCSCOUT_LLM_API_KEY")?;

    let env = parse_environment(&or_default("LOCSCOUT_ENV", "development"));
    let bind_addr = parse("LOCSCOUT_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("LOCSCOUT_LOG_LEVEL", "info");
    let database_url = optional("DATABASE_URL");

    let db_max_connections = parse_u32("LOCSCOUT_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("LOCSCOUT_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("LOCSCOUT_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let llm_base_url = or_default("LOCSCOUT_LLM_BASE_URL", DEFAULT_LLM_BASE_URL);
    let llm_model = or_default("LOCSCOUT_LLM_MODEL", DEFAULT_LLM_MODEL);
    let grounding_model = or_default("LOCSCOUT_GROUNDING_MODEL", &llm_model);

    let vision_api_key = optional("LOCSCOUT_VISION_API_KEY");
    let vision_base_url = or_default("LOCSCOUT_VISION_BASE_URL", DEFAULT_VISION_BASE_URL);
    let vision_model = or_default("LOCSCOUT_VISION_MODEL", DEFAULT_VISION_MODEL);
    let google_maps_api_key = optional("GOOGLE_MAPS_API_KEY");
    let vapi_webhook_secret = optional("VAPI_WEBHOOK_SECRET");

    let request_timeout_secs = parse_u64("LOCSCOUT_REQUEST_TIMEOUT_SECS", "60")?;
    let llm_max_retries = parse_u32("LOCSCOUT_LLM_MAX_RETRIES", "3")?;
    let retry_backoff_base_ms = parse_u64("LOCSCOUT_RETRY_BACKOFF_BASE_MS", "1000")?;

    let grounding_max_concurrent = parse_positive_usize("LOCSCOUT_GROUNDING_MAX_CONCURRENT", "5")?;
    let grounding_worker_cap = parse_positive_usize("LOCSCOUT_GROUNDING_WORKER_CAP", "10")?;
    let analysis_max_concurrent = parse_positive_usize("LOCSCOUT_ANALYSIS_MAX_CONCURRENT", "8")?;
    let default_city = or_default("LOCSCOUT_DEFAULT_CITY", crate::requirement::DEFAULT_TARGET_CITY);
    let default_max_results = parse_positive_usize("LOCSCOUT_DEFAULT_MAX_RESULTS", "10")?;

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        database_url,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        llm_api_key,
        llm_base_url,
        llm_model,
        grounding_model,
        vision_api_key,
        vision_base_url,
        vision_model,
        google_maps_api_key,
        vapi_webhook_secret,
        request_timeout_secs,
        llm_max_retries,
        retry_backoff_base_ms,
        grounding_max_concurrent,
        grounding_worker_cap,
        analysis_max_concurrent,
        default_city,
        default_max_results,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}
