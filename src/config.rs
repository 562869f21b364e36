use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SEARCH_BASE_URL: &str = "https://www.googleapis.com/books/v1/";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;
const HTTP_USER_AGENT: &str = "BookNest/0.1";

/// Runtime settings. Read from `BOOKNEST_*` environment variables with defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_key: String,
    pub search_base_url: String,
    pub http_timeout: Duration,
    pub user_agent: String,
    /// `None` keeps documents in memory only.
    pub database_path: Option<PathBuf>,
    /// Registration accepts only addresses ending in `@{domain}` when set.
    pub required_email_domain: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_key: String::new(),
            search_base_url: DEFAULT_SEARCH_BASE_URL.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            user_agent: HTTP_USER_AGENT.to_string(),
            database_path: None,
            required_email_domain: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Config::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Config::default();

        let http_timeout = match value("BOOKNEST_HTTP_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    log::warn!("ignoring invalid BOOKNEST_HTTP_TIMEOUT_SECS={}", raw);
                    defaults.http_timeout
                }
            },
            None => defaults.http_timeout,
        };

        let api_key = value("BOOKNEST_API_KEY").unwrap_or_default();
        if api_key.is_empty() {
            log::warn!("BOOKNEST_API_KEY is not set; search requests will be unauthenticated");
        }

        Config {
            api_key,
            search_base_url: value("BOOKNEST_SEARCH_BASE_URL").unwrap_or(defaults.search_base_url),
            http_timeout,
            user_agent: defaults.user_agent,
            database_path: value("BOOKNEST_DB_PATH").map(PathBuf::from),
            required_email_domain: value("BOOKNEST_EMAIL_DOMAIN")
                .map(|domain| domain.trim_start_matches('@').to_lowercase()),
        }
    }
}
