use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

/// Crawler knobs. Defaults reproduce the saramin search the board was built around.
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    pub enabled: bool,
    pub cron: String,
    pub search_url: String,
    pub max_pages: u32,
    pub page_count: u32,
    pub headless: bool,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub page_timeout_secs: u64,
}

pub const DEFAULT_SEARCH_URL: &str = "https://www.saramin.co.kr/zf_user/search?company_cd=0%2C1%2C2%2C3%2C4%2C5%2C6%2C7%2C9%2C10&company_type=scale001%2Ckosdaq%2Cstock%2Ckospi%2Cscale004%2Cscale003%2Cscale005&job_type=2%2C1&search_done=y";

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cron: "0 0 0 * * *".into(),
            search_url: DEFAULT_SEARCH_URL.into(),
            max_pages: 3,
            page_count: 40,
            headless: true,
            min_delay_ms: 1000,
            max_delay_ms: 3000,
            page_timeout_secs: 15,
        }
    }
}

impl CrawlerConfig {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    fn from_env() -> Self {
        let d = Self::default();
        Self {
            enabled: env_parse("CRAWLER_ENABLED", d.enabled),
            cron: std::env::var("CRAWLER_CRON").unwrap_or(d.cron),
            search_url: std::env::var("CRAWLER_SEARCH_URL").unwrap_or(d.search_url),
            max_pages: env_parse("CRAWLER_MAX_PAGES", d.max_pages),
            page_count: env_parse("CRAWLER_PAGE_COUNT", d.page_count),
            headless: env_parse("CRAWLER_HEADLESS", d.headless),
            min_delay_ms: env_parse("CRAWLER_MIN_DELAY_MS", d.min_delay_ms),
            max_delay_ms: env_parse("CRAWLER_MAX_DELAY_MS", d.max_delay_ms),
            page_timeout_secs: env_parse("CRAWLER_PAGE_TIMEOUT_SECS", d.page_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub crawler: CrawlerConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "jobboard".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "jobboard-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: env_parse("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };
        let storage = StorageConfig {
            endpoint: std::env::var("MINIO_ENDPOINT").unwrap_or_else(|_| "http://localhost:9000".into()),
            bucket: std::env::var("MINIO_BUCKET").unwrap_or_else(|_| "resumes".into()),
            access_key: std::env::var("MINIO_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".into()),
            secret_key: std::env::var("MINIO_SECRET_KEY").unwrap_or_else(|_| "minioadmin".into()),
            region: std::env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".into()),
        };
        Ok(Self {
            database_url,
            jwt,
            storage,
            crawler: CrawlerConfig::from_env(),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crawler_defaults_match_saramin_layout() {
        let c = CrawlerConfig::default();
        assert!(!c.enabled);
        assert_eq!(c.max_pages, 3);
        assert_eq!(c.page_count, 40);
        assert_eq!(c.page_timeout(), Duration::from_secs(15));
        assert!(c.min_delay_ms < c.max_delay_ms);
    }

    #[test]
    fn env_parse_falls_back_on_garbage() {
        std::env::set_var("JOBBOARD_TEST_PARSE", "not-a-number");
        assert_eq!(env_parse("JOBBOARD_TEST_PARSE", 7u32), 7);
        std::env::set_var("JOBBOARD_TEST_PARSE", " 12 ");
        assert_eq!(env_parse("JOBBOARD_TEST_PARSE", 7u32), 12);
        std::env::remove_var("JOBBOARD_TEST_PARSE");
    }
}
