//! Configuration types for subrelay
//!
//! Tunables live in [`Config`] (serde, with defaults); secrets live in
//! [`Credentials`] and are only ever read from the process environment.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Main configuration for the relay
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Route file mapping subreddits to topics (default: "subreddits.db")
    #[serde(default = "default_routes_path")]
    pub routes_path: PathBuf,

    /// SQLite database holding seen items (default: "subrelay.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Sleep between passes (default: 30 minutes)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Newest posts requested per source per pass (default: 25)
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: u32,

    /// Top comments included in each message (default: 3)
    #[serde(default = "default_comment_limit")]
    pub comment_limit: usize,

    /// Display length of a comment body before truncation (default: 200)
    #[serde(default = "default_comment_max_chars")]
    pub comment_max_chars: usize,

    /// Timeout applied to every HTTP request (default: 20 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Sources processed at once within a pass (default: 1 = sequential)
    #[serde(default = "default_max_concurrent_sources")]
    pub max_concurrent_sources: usize,

    /// Forget seen items older than this (None = keep forever)
    #[serde(default, with = "optional_duration_serde")]
    pub seen_retention: Option<Duration>,

    /// Retry behavior for transient HTTP failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Endpoint settings for the two external APIs
    #[serde(default)]
    pub endpoints: EndpointConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            routes_path: default_routes_path(),
            database_path: default_database_path(),
            poll_interval: default_poll_interval(),
            fetch_limit: default_fetch_limit(),
            comment_limit: default_comment_limit(),
            comment_max_chars: default_comment_max_chars(),
            request_timeout: default_request_timeout(),
            max_concurrent_sources: default_max_concurrent_sources(),
            seen_retention: None,
            retry: RetryConfig::default(),
            endpoints: EndpointConfig::default(),
        }
    }
}

impl Config {
    /// Build a config from defaults overridden by `SUBRELAY_*` environment variables
    ///
    /// Recognized variables: `SUBRELAY_ROUTES`, `SUBRELAY_DATABASE`,
    /// `SUBRELAY_INTERVAL_SECS`, `SUBRELAY_FETCH_LIMIT`, `SUBRELAY_CONCURRENCY`,
    /// `SUBRELAY_SEEN_RETENTION_DAYS`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = env_opt("SUBRELAY_ROUTES") {
            config.routes_path = PathBuf::from(path);
        }
        if let Some(path) = env_opt("SUBRELAY_DATABASE") {
            config.database_path = PathBuf::from(path);
        }
        if let Some(secs) = env_parse::<u64>("SUBRELAY_INTERVAL_SECS")? {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(limit) = env_parse::<u32>("SUBRELAY_FETCH_LIMIT")? {
            config.fetch_limit = limit;
        }
        if let Some(n) = env_parse::<usize>("SUBRELAY_CONCURRENCY")? {
            config.max_concurrent_sources = n;
        }
        if let Some(days) = env_parse::<u64>("SUBRELAY_SEEN_RETENTION_DAYS")? {
            config.seen_retention = Some(Duration::from_secs(days * 86_400));
        }

        Ok(config)
    }

    /// Validate configuration values for basic sanity
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::config_at("poll_interval", "must be greater than zero"));
        }
        if self.fetch_limit == 0 || self.fetch_limit > 100 {
            return Err(Error::config_at("fetch_limit", "must be between 1 and 100"));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::config_at("request_timeout", "must be greater than zero"));
        }
        if self.max_concurrent_sources == 0 {
            return Err(Error::config_at(
                "max_concurrent_sources",
                "must be greater than zero",
            ));
        }
        if self.endpoints.user_agent.trim().is_empty() {
            return Err(Error::config_at("endpoints.user_agent", "must not be empty"));
        }
        Ok(())
    }
}

/// Base URLs and client identity for the external APIs
///
/// Overridable so tests can point the clients at a mock server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// OAuth token host (default: "https://www.reddit.com")
    #[serde(default = "default_reddit_auth_base")]
    pub reddit_auth_base: String,

    /// Authenticated API host (default: "https://oauth.reddit.com")
    #[serde(default = "default_reddit_api_base")]
    pub reddit_api_base: String,

    /// Bot API host (default: "https://api.telegram.org")
    #[serde(default = "default_telegram_api_base")]
    pub telegram_api_base: String,

    /// User-Agent sent to Reddit, which rejects generic agents
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            reddit_auth_base: default_reddit_auth_base(),
            reddit_api_base: default_reddit_api_base(),
            telegram_api_base: default_telegram_api_base(),
            user_agent: default_user_agent(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Reddit script-app credentials
#[derive(Clone)]
pub struct RedditCredentials {
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Account username
    pub username: String,
    /// Account password
    pub password: String,
}

/// Telegram bot credentials and destination group
#[derive(Clone)]
pub struct TelegramCredentials {
    /// Bot API token
    pub bot_token: String,
    /// Destination group (forum) chat id
    pub group_id: i64,
    /// Topic that receives error reports; None disables reporting
    pub error_topic_id: Option<i64>,
}

/// All secrets required at startup
#[derive(Clone)]
pub struct Credentials {
    /// Source API credentials
    pub reddit: RedditCredentials,
    /// Destination API credentials
    pub telegram: TelegramCredentials,
}

impl Credentials {
    /// Read credentials from the environment
    ///
    /// Every required variable is checked; a missing, empty, or malformed
    /// one is an [`Error::Credential`] naming the variable.
    pub fn from_env() -> Result<Self> {
        let reddit = RedditCredentials {
            client_id: env_required("REDDIT_CLIENT_ID")?,
            client_secret: env_required("REDDIT_CLIENT_SECRET")?,
            username: env_required("REDDIT_USERNAME")?,
            password: env_required("REDDIT_PASSWORD")?,
        };

        let bot_token = env_required("TELEGRAM_BOT_TOKEN")?;
        let group_id = parse_chat_id("TELEGRAM_GROUP_ID", &env_required("TELEGRAM_GROUP_ID")?)?;
        let error_topic_id = match env_opt("TELEGRAM_ERROR_TOPIC_ID") {
            Some(raw) => Some(parse_chat_id("TELEGRAM_ERROR_TOPIC_ID", &raw)?),
            None => None,
        };

        Ok(Self {
            reddit,
            telegram: TelegramCredentials {
                bot_token,
                group_id,
                error_topic_id,
            },
        })
    }
}

// Secrets never reach logs through Debug
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("reddit_client_id", &self.reddit.client_id)
            .field("reddit_username", &self.reddit.username)
            .field("telegram_group_id", &self.telegram.group_id)
            .field("telegram_error_topic_id", &self.telegram.error_topic_id)
            .finish_non_exhaustive()
    }
}

fn env_opt(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_required(var: &str) -> Result<String> {
    env_opt(var).ok_or_else(|| Error::credential(var, "not set"))
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Result<Option<T>> {
    match env_opt(var) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::config_at(var, format!("invalid value '{}'", raw))),
        None => Ok(None),
    }
}

fn parse_chat_id(var: &str, raw: &str) -> Result<i64> {
    raw.parse::<i64>()
        .map_err(|_| Error::credential(var, format!("'{}' is not an integer id", raw)))
}

// Default value functions
fn default_routes_path() -> PathBuf {
    PathBuf::from("subreddits.db")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("subrelay.db")
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_fetch_limit() -> u32 {
    25
}

fn default_comment_limit() -> usize {
    3
}

fn default_comment_max_chars() -> usize {
    200
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_max_concurrent_sources() -> usize {
    1
}

fn default_reddit_auth_base() -> String {
    "https://www.reddit.com".to_string()
}

fn default_reddit_api_base() -> String {
    "https://oauth.reddit.com".to_string()
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_user_agent() -> String {
    format!("subrelay/{} (Reddit to Telegram relay)", env!("CARGO_PKG_VERSION"))
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
