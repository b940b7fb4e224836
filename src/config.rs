use clap::Parser;

/// Ingest-to-delivery pipeline configuration, sourced from CLI flags or
/// matching environment variables.
#[derive(Parser, Debug, Clone)]
#[command(name = "surebet-retador", version, about)]
pub struct Config {
    /// Surebets feed API base URL
    #[arg(long, env = "API_URL", default_value = "https://api.example.com/v1")]
    pub api_url: String,

    /// Bearer token for the feed API
    #[arg(long, env = "API_TOKEN")]
    pub api_token: String,

    /// Feed HTTP request timeout, seconds
    #[arg(long, env = "API_TIMEOUT", default_value = "30")]
    pub api_timeout: u64,

    /// Redis host for the dedupe store
    #[arg(long, env = "REDIS_HOST", default_value = "127.0.0.1")]
    pub redis_host: String,

    /// Redis port
    #[arg(long, env = "REDIS_PORT", default_value = "6379")]
    pub redis_port: u16,

    /// Redis password, if required
    #[arg(long, env = "REDIS_PASSWORD")]
    pub redis_password: Option<String>,

    /// Redis username, if required (ACL-based auth)
    #[arg(long, env = "REDIS_USERNAME")]
    pub redis_username: Option<String>,

    /// Comma-separated Telegram bot tokens, rotated round-robin by the gateway
    #[arg(long, env = "TELEGRAM_BOT_TOKENS", value_delimiter = ',')]
    pub telegram_bot_tokens: Vec<String>,

    /// Telegram channel used for gateway-level alerting (not a pick channel)
    #[arg(long, env = "TELEGRAM_LOG_CHANNEL")]
    pub telegram_log_channel: Option<String>,

    /// Rate limiter base polling interval, seconds
    #[arg(long, env = "POLLING_BASE_INTERVAL", default_value = "0.5")]
    pub polling_base_interval: f64,

    /// Rate limiter max polling interval, seconds
    #[arg(long, env = "POLLING_MAX_INTERVAL", default_value = "5.0")]
    pub polling_max_interval: f64,

    /// Minimum accepted decimal odds for either leg
    #[arg(long, env = "MIN_ODDS", default_value = "1.10")]
    pub min_odds: f64,

    /// Maximum accepted decimal odds for either leg
    #[arg(long, env = "MAX_ODDS", default_value = "9.99")]
    pub max_odds: f64,

    /// Minimum accepted surebet profit percentage
    #[arg(long, env = "MIN_PROFIT", default_value = "-1.0")]
    pub min_profit: f64,

    /// Maximum accepted surebet profit percentage
    #[arg(long, env = "MAX_PROFIT", default_value = "25.0")]
    pub max_profit: f64,

    /// Max picks processed concurrently per poll batch
    #[arg(long, env = "CONCURRENT_PICKS", default_value = "250")]
    pub concurrent_picks: usize,

    /// Max concurrent outbound HTTP requests to the feed
    #[arg(long, env = "CONCURRENT_REQUESTS", default_value = "10")]
    pub concurrent_requests: usize,

    /// Local cache entry TTL, seconds
    #[arg(long, env = "CACHE_TTL", default_value = "60")]
    pub cache_ttl: u64,

    /// Local cache max entries
    #[arg(long, env = "CACHE_MAX_SIZE", default_value = "10000")]
    pub cache_max_size: usize,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_token.trim().is_empty() {
            anyhow::bail!("API_TOKEN must be set");
        }
        if self.telegram_bot_tokens.is_empty()
            || self.telegram_bot_tokens.iter().all(|t| t.trim().is_empty())
        {
            anyhow::bail!("TELEGRAM_BOT_TOKENS must contain at least one token");
        }
        if self.api_timeout == 0 || self.api_timeout > 300 {
            anyhow::bail!("api_timeout must be between 1 and 300 seconds");
        }
        if self.polling_base_interval <= 0.0 || self.polling_base_interval > self.polling_max_interval
        {
            anyhow::bail!("polling_base_interval must be positive and <= polling_max_interval");
        }
        if self.polling_max_interval > 300.0 {
            anyhow::bail!("polling_max_interval must be <= 300 seconds");
        }
        if self.min_odds < 1.01 || self.min_odds >= self.max_odds {
            anyhow::bail!("min_odds must be >= 1.01 and < max_odds");
        }
        if self.max_odds > 1000.0 {
            anyhow::bail!("max_odds must be <= 1000.0");
        }
        if self.min_profit < -10.0 || self.min_profit >= self.max_profit {
            anyhow::bail!("min_profit must be >= -10.0 and < max_profit");
        }
        if self.max_profit > 100.0 {
            anyhow::bail!("max_profit must be <= 100.0");
        }
        if self.concurrent_picks == 0 {
            anyhow::bail!("concurrent_picks must be positive");
        }
        if self.concurrent_requests == 0 {
            anyhow::bail!("concurrent_requests must be positive");
        }
        if self.cache_max_size == 0 {
            anyhow::bail!("cache_max_size must be positive");
        }
        Ok(())
    }

    pub fn redis_url(&self) -> String {
        let auth = match (&self.redis_username, &self.redis_password) {
            (Some(u), Some(p)) => format!("{u}:{p}@"),
            (None, Some(p)) => format!(":{p}@"),
            _ => String::new(),
        };
        format!("redis://{auth}{}:{}", self.redis_host, self.redis_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            api_url: "https://api.example.com/v1".into(),
            api_token: "tok".into(),
            api_timeout: 30,
            redis_host: "127.0.0.1".into(),
            redis_port: 6379,
            redis_password: None,
            redis_username: None,
            telegram_bot_tokens: vec!["bot1".into()],
            telegram_log_channel: None,
            polling_base_interval: 0.5,
            polling_max_interval: 5.0,
            min_odds: 1.10,
            max_odds: 9.99,
            min_profit: -1.0,
            max_profit: 25.0,
            concurrent_picks: 250,
            concurrent_requests: 10,
            cache_ttl: 60,
            cache_max_size: 10_000,
        }
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_token() {
        let mut c = base_config();
        c.api_token = "".into();
        assert!(c.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_bot_tokens() {
        let mut c = base_config();
        c.telegram_bot_tokens = vec![];
        assert!(c.validate().is_err());
    }

    #[test]
    fn redis_url_includes_auth() {
        let mut c = base_config();
        c.redis_password = Some("secret".into());
        assert_eq!(c.redis_url(), "redis://:secret@127.0.0.1:6379");
    }
}
