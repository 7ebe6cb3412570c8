use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables.
///
/// Required vars panic with a clear message at startup; optional vars fall
/// back to a documented default.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: Option<String>,

    pub anthropic_api_key: String,

    pub waf_fingerprinter_url: String,
    pub proxy_api_url: String,
    pub proxy_api_user: String,
    pub proxy_api_key: String,

    pub web_host: String,
    pub web_port: u16,
    pub workers: usize,

    pub publisher_freshness_ttl: Duration,
    pub article_freshness_ttl: Duration,
    pub job_timeout: Duration,
    pub fetch_timeout: Duration,

    /// User-agent identifier used when evaluating robots.txt directives.
    pub robots_user_agent: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            redis_url: env::var("REDIS_URL").ok(),
            anthropic_api_key: required_env("ANTHROPIC_API_KEY"),
            waf_fingerprinter_url: required_env("WAF_FINGERPRINTER_URL"),
            proxy_api_url: required_env("PROXY_API_URL"),
            proxy_api_user: env::var("PROXY_API_USER").unwrap_or_default(),
            proxy_api_key: required_env("PROXY_API_KEY"),
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: parse_env_or("WEB_PORT", 3000),
            workers: parse_env_or("OUTPOST_WORKERS", num_workers_default()),
            publisher_freshness_ttl: Duration::from_secs(parse_env_or(
                "PUBLISHER_FRESHNESS_TTL_SECS",
                24 * 3600,
            )),
            article_freshness_ttl: Duration::from_secs(parse_env_or(
                "ARTICLE_FRESHNESS_TTL_SECS",
                24 * 3600,
            )),
            job_timeout: Duration::from_secs(parse_env_or("JOB_TIMEOUT_SECS", 600)),
            fetch_timeout: Duration::from_secs(parse_env_or("FETCH_TIMEOUT_SECS", 30)),
            robots_user_agent: env::var("ROBOTS_USER_AGENT")
                .unwrap_or_else(|_| "itsascout".to_string()),
        }
    }

    /// Log presence and length of each sensitive env var, never its value.
    pub fn log_redacted(&self) {
        let vars = [
            ("DATABASE_URL", &self.database_url),
            ("ANTHROPIC_API_KEY", &self.anthropic_api_key),
            ("PROXY_API_KEY", &self.proxy_api_key),
        ];
        for (name, value) in vars {
            if value.is_empty() {
                tracing::info!("{name} = (empty)");
            } else {
                tracing::info!("{name} = ({} chars)", value.len());
            }
        }
    }
}

fn num_workers_default() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
