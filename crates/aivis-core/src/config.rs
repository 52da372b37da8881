use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

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
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var).ok().filter(|v| !v.trim().is_empty())
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

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let database_url = require("DATABASE_URL")?;

    let env = parse_environment(&or_default("AIVIS_ENV", "development"))?;

    let bind_addr = parse("AIVIS_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("AIVIS_LOG_LEVEL", "info");
    let tracking_path = PathBuf::from(or_default(
        "AIVIS_TRACKING_PATH",
        "./config/tracking.yaml",
    ));

    let db_max_connections = parse_u32("AIVIS_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("AIVIS_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("AIVIS_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let answer_api_url = or_default("AIVIS_ANSWER_API_URL", "https://api.openai.com/v1");
    let answer_api_key = optional("AIVIS_ANSWER_API_KEY");
    let serp_api_url = optional("AIVIS_SERP_API_URL");
    let serp_api_key = optional("AIVIS_SERP_API_KEY");

    let upstream_timeout_secs = parse_u64("AIVIS_UPSTREAM_TIMEOUT_SECS", "60")?;
    let upstream_max_retries = parse_u32("AIVIS_UPSTREAM_MAX_RETRIES", "2")?;
    let upstream_backoff_base_ms = parse_u64("AIVIS_UPSTREAM_BACKOFF_BASE_MS", "1000")?;
    let max_concurrent_jobs = parse_usize("AIVIS_MAX_CONCURRENT_JOBS", "4")?;
    let page_fetch_timeout_secs = parse_u64("AIVIS_PAGE_FETCH_TIMEOUT_SECS", "15")?;
    let user_agent = or_default("AIVIS_USER_AGENT", "aivis/0.1 (visibility-tracking)");
    let webhook_url = optional("AIVIS_WEBHOOK_URL");

    let analysis_cron = or_default("AIVIS_ANALYSIS_CRON", "0 0 */6 * * *");
    let trust_cron = or_default("AIVIS_TRUST_CRON", "0 30 1 * * *");
    let verify_cron = or_default("AIVIS_VERIFY_CRON", "0 15 * * * *");

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        tracking_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        answer_api_url,
        answer_api_key,
        serp_api_url,
        serp_api_key,
        upstream_timeout_secs,
        upstream_max_retries,
        upstream_backoff_base_ms,
        max_concurrent_jobs,
        page_fetch_timeout_secs,
        user_agent,
        webhook_url,
        analysis_cron,
        trust_cron,
        verify_cron,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "AIVIS_ENV".to_string(),
            reason: format!("expected development, test, or production; got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
