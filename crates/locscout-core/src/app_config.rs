use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    /// Postgres URL; the server falls back to an in-memory candidate store when unset.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub grounding_model: String,
    /// Visual verification is disabled when this is `None`.
    pub vision_api_key: Option<String>,
    pub vision_base_url: String,
    pub vision_model: String,
    /// Photo lookup is disabled when this is `None`.
    pub google_maps_api_key: Option<String>,
    pub vapi_webhook_secret: Option<String>,
    pub request_timeout_secs: u64,
    pub llm_max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub grounding_max_concurrent: usize,
    pub grounding_worker_cap: usize,
    pub analysis_max_concurrent: usize,
    pub default_city: String,
    pub default_max_results: usize,
}

fn redact(value: Option<&String>) -> Option<&'static str> {
    value.map(|_| "[redacted]")
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &redact(self.database_url.as_ref()))
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("llm_api_key", &"[redacted]")
            .field("llm_base_url", &self.llm_base_url)
            .field("llm_model", &self.llm_model)
            .field("grounding_model", &self.grounding_model)
            .field("vision_api_key", &redact(self.vision_api_key.as_ref()))
            .field("vision_base_url", &self.vision_base_url)
            .field("vision_model", &self.vision_model)
            .field(
                "google_maps_api_key",
                &redact(self.google_maps_api_key.as_ref()),
            )
            .field(
                "vapi_webhook_secret",
                &redact(self.vapi_webhook_secret.as_ref()),
            )
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("llm_max_retries", &self.llm_max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("grounding_max_concurrent", &self.grounding_max_concurrent)
            .field("grounding_worker_cap", &self.grounding_worker_cap)
            .field("analysis_max_concurrent", &self.analysis_max_concurrent)
            .field("default_city", &self.default_city)
            .field("default_max_results", &self.default_max_results)
            .finish()
    }
}
