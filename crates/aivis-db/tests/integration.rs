//! Offline tests for aivis-db pool configuration and row types.
//! These tests do not require a live database connection.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use aivis_core::{AppConfig, Environment, VerificationStatus};
use aivis_db::{PoolConfig, UrlCitationRow};

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        tracking_path: PathBuf::from("./config/tracking.yaml"),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        answer_api_url: "https://api.openai.com/v1".to_string(),
        answer_api_key: None,
        serp_api_url: None,
        serp_api_key: None,
        upstream_timeout_secs: 30,
        upstream_max_retries: 2,
        upstream_backoff_base_ms: 500,
        max_concurrent_jobs: 4,
        page_fetch_timeout_secs: 15,
        user_agent: "ua".to_string(),
        webhook_url: None,
        analysis_cron: "0 0 */6 * * *".to_string(),
        trust_cron: "0 30 1 * * *".to_string(),
        verify_cron: "0 15 * * * *".to_string(),
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

fn ledger_row(status: &str) -> UrlCitationRow {
    use chrono::Utc;

    UrlCitationRow {
        id: 1,
        url: "https://acme.com/pricing".to_string(),
        domain: "acme.com".to_string(),
        citation_count: 3,
        engines: vec!["gpt-4o".to_string()],
        prompt_ids: vec![10],
        claim: Some("Acme has a free tier".to_string()),
        first_seen_at: Utc::now(),
        last_seen_at: Utc::now(),
        verification_status: status.to_string(),
        trust_score: None,
        hallucination_risk: None,
        content_hash: None,
        verification_error: None,
        verified_at: None,
    }
}

#[test]
fn ledger_row_parses_status() {
    assert_eq!(
        ledger_row("hallucinated").status().unwrap(),
        VerificationStatus::Hallucinated
    );
    assert!(ledger_row("bogus").status().is_err());
}
