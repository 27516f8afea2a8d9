use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::dedup::DedupPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub assembly_api_key: String,
    pub assembly_api_base_url: String,
    pub profile_base_url: String,
    pub election_csv_path: PathBuf,
    pub lexicon_path: Option<PathBuf>, // Embedded lexicon when unset
    pub page_size: u32,
    pub bill_max_pages: u32,
    pub http_timeout_secs: u64,
    pub profile_fetch_delay_ms: u64,
    pub page_delay_ms: u64,
    pub term_delay_ms: u64,
    pub stage_delay_ms: u64,
    pub dedup_policy: DedupPolicy,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number", key)),
        _ => Ok(default),
    }
}

fn http_url(key: &str, default: &str) -> anyhow::Result<String> {
    let url = std::env::var(key).unwrap_or_else(|_| default.to_string());
    if url.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", key);
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", key);
    }
    Ok(url.trim_end_matches('/').to_string())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DB_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            assembly_api_key: std::env::var("ASSEMBLY_API_KEY")
                .map_err(|_| anyhow::anyhow!("ASSEMBLY_API_KEY environment variable required"))
                .and_then(|key| {
                    if key.trim().is_empty() {
                        anyhow::bail!("ASSEMBLY_API_KEY cannot be empty");
                    }
                    Ok(key)
                })?,
            assembly_api_base_url: http_url(
                "ASSEMBLY_API_BASE_URL",
                "https://open.assembly.go.kr/portal/openapi",
            )?,
            profile_base_url: http_url("PROFILE_BASE_URL", "https://www.assembly.go.kr/members")?,
            election_csv_path: std::env::var("ELECTION_CSV_PATH")
                .unwrap_or_else(|_| "국회의원_당선자_통합명부_20_21_22대.csv".to_string())
                .into(),
            lexicon_path: std::env::var("LEXICON_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            page_size: env_or("SYNC_PAGE_SIZE", 1000)?,
            bill_max_pages: env_or("BILL_MAX_PAGES", 10)?,
            http_timeout_secs: env_or("HTTP_TIMEOUT_SECS", 30)?,
            profile_fetch_delay_ms: env_or("PROFILE_FETCH_DELAY_MS", 500)?,
            page_delay_ms: env_or("PAGE_DELAY_MS", 2000)?,
            term_delay_ms: env_or("TERM_DELAY_MS", 3000)?,
            stage_delay_ms: env_or("STAGE_DELAY_MS", 5000)?,
            dedup_policy: std::env::var("DEDUP_POLICY")
                .ok()
                .map(|raw| raw.parse())
                .transpose()
                .map_err(|e: String| anyhow::anyhow!(e))?
                .unwrap_or_default(),
        };

        if config.page_size == 0 {
            anyhow::bail!("SYNC_PAGE_SIZE must be greater than zero");
        }

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            log_prefix(&config.database_url)
        );
        tracing::debug!("Assembly API base URL: {}", config.assembly_api_base_url);
        tracing::debug!("Profile base URL: {}", config.profile_base_url);
        tracing::debug!("Election table: {}", config.election_csv_path.display());
        if let Some(ref lexicon) = config.lexicon_path {
            tracing::info!("Lexicon override configured: {}", lexicon.display());
        }
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn profile_fetch_delay(&self) -> Duration {
        Duration::from_millis(self.profile_fetch_delay_ms)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn term_delay(&self) -> Duration {
        Duration::from_millis(self.term_delay_ms)
    }

    pub fn stage_delay(&self) -> Duration {
        Duration::from_millis(self.stage_delay_ms)
    }
}

/// First 20 characters, for logging connection strings without credentials.
fn log_prefix(value: &str) -> String {
    value.chars().take(20).collect()
}
