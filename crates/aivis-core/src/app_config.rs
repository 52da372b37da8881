use std::net::SocketAddr;
use std::path::PathBuf;

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
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub tracking_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    /// Base URL of an OpenAI-compatible chat completions API.
    pub answer_api_url: String,
    pub answer_api_key: Option<String>,
    /// SERP API base URL. `None` disables the scraping phase lookup.
    pub serp_api_url: Option<String>,
    pub serp_api_key: Option<String>,
    pub upstream_timeout_secs: u64,
    pub upstream_max_retries: u32,
    pub upstream_backoff_base_ms: u64,
    pub max_concurrent_jobs: usize,
    pub page_fetch_timeout_secs: u64,
    pub user_agent: String,
    pub webhook_url: Option<String>,
    pub analysis_cron: String,
    pub trust_cron: String,
    pub verify_cron: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("tracking_path", &self.tracking_path)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("answer_api_url", &self.answer_api_url)
            .field(
                "answer_api_key",
                &self.answer_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("serp_api_url", &self.serp_api_url)
            .field(
                "serp_api_key",
                &self.serp_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("upstream_timeout_secs", &self.upstream_timeout_secs)
            .field("upstream_max_retries", &self.upstream_max_retries)
            .field("upstream_backoff_base_ms", &self.upstream_backoff_base_ms)
            .field("max_concurrent_jobs", &self.max_concurrent_jobs)
            .field("page_fetch_timeout_secs", &self.page_fetch_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field(
                "webhook_url",
                &self.webhook_url.as_ref().map(|_| "[redacted]"),
            )
            .field("analysis_cron", &self.analysis_cron)
            .field("trust_cron", &self.trust_cron)
            .field("verify_cron", &self.verify_cron)
            .finish()
    }
}
