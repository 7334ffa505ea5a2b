//! Common test utilities for subrelay integration tests

#[allow(dead_code)]
pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::*;

use std::path::Path;
use std::time::Duration;
use subrelay::config::{RedditCredentials, TelegramCredentials};
use subrelay::{Config, Credentials, RetryConfig};
use wiremock::MockServer;

pub const BOT_TOKEN: &str = "4242:test-token";
pub const GROUP_ID: i64 = -1001000000001;
pub const ERROR_TOPIC: i64 = 900;

/// Config pointing both APIs at one mock server, with no retries
pub fn test_config(server: &MockServer, dir: &Path) -> Config {
    let mut config = Config::default();
    config.routes_path = dir.join("subreddits.db");
    config.database_path = dir.join("subrelay.db");
    config.request_timeout = Duration::from_secs(5);
    config.retry = RetryConfig {
        max_attempts: 0,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config.endpoints.reddit_auth_base = server.uri();
    config.endpoints.reddit_api_base = server.uri();
    config.endpoints.telegram_api_base = server.uri();
    config
}

pub fn test_credentials() -> Credentials {
    Credentials {
        reddit: RedditCredentials {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            username: "relaybot".to_string(),
            password: "hunter2".to_string(),
        },
        telegram: TelegramCredentials {
            bot_token: BOT_TOKEN.to_string(),
            group_id: GROUP_ID,
            error_topic_id: Some(ERROR_TOPIC),
        },
    }
}

/// Path of a Bot API method on the mock server
pub fn bot_path(method: &str) -> String {
    format!("/bot{}/{}", BOT_TOKEN, method)
}
