//! Reddit fetcher
//!
//! [`ContentSource`] is the seam the relay fetches through; [`RedditClient`]
//! implements it against the OAuth API using a script-app password grant.
//! The bearer token is cached and refreshed shortly before it expires, or
//! immediately after the API answers 401.

use crate::config::{Config, RedditCredentials, RetryConfig};
use crate::error::{Error, Result};
use crate::media;
use crate::retry::with_retry;
use crate::types::{Comment, Item};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::de::{DeserializeOwned, IgnoredAny};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

mod models;

pub use models::{
    GalleryData, GalleryItem, MediaMetadata, MediaSource, RawMedia, RawPost, RedditVideo,
};
use models::{Listing, RawComment, TokenResponse};

/// Refresh the token this long before Reddit says it expires
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Author name Reddit reports for removed accounts and comments
const DELETED: &str = "[deleted]";

/// Where items come from
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Newest items of `source`, newest first, at most `limit`
    ///
    /// Any failure is reported as [`Error::SourceUnavailable`].
    async fn fetch_latest(&self, source: &str, limit: u32) -> Result<Vec<Item>>;

    /// Top `n` comments of `item` by score, highest first
    ///
    /// Any failure is reported as [`Error::CommentFetch`].
    async fn fetch_top_comments(&self, item: &Item, n: usize) -> Result<Vec<Comment>>;
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }
}

/// Reddit OAuth API client
pub struct RedditClient {
    http: reqwest::Client,
    credentials: RedditCredentials,
    auth_base: String,
    api_base: String,
    retry: RetryConfig,
    token: Mutex<Option<AccessToken>>,
}

impl RedditClient {
    /// Create a client; no request is made until the first fetch
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &Config, credentials: RedditCredentials) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.endpoints.user_agent.clone())
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            credentials,
            auth_base: config.endpoints.reddit_auth_base.trim_end_matches('/').to_string(),
            api_base: config.endpoints.reddit_api_base.trim_end_matches('/').to_string(),
            retry: config.retry.clone(),
            token: Mutex::new(None),
        })
    }

    /// Current bearer token, requesting a new one when needed
    async fn access_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref()
            && token.is_fresh()
        {
            return Ok(token.value.clone());
        }

        let token = self.request_token().await?;
        let value = token.value.clone();
        *guard = Some(token);
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    async fn request_token(&self) -> Result<AccessToken> {
        debug!(username = %self.credentials.username, "Requesting Reddit access token");

        let response = self
            .http
            .post(format!("{}/api/v1/access_token", self.auth_base))
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&[
                ("grant_type", "password"),
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(rate_limited(response.headers()));
        }
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: "access token request rejected".to_string(),
            });
        }

        let body: TokenResponse = response.json().await?;
        match (body.access_token, body.error) {
            (Some(value), None) if !value.is_empty() => {
                let lifetime = Duration::from_secs(body.expires_in.unwrap_or(3600));
                info!(expires_in_secs = lifetime.as_secs(), "Obtained Reddit access token");
                Ok(AccessToken {
                    value,
                    expires_at: Instant::now() + lifetime,
                })
            }
            (_, error) => Err(Error::Api {
                status: status.as_u16(),
                message: format!(
                    "access token request failed: {}",
                    error.unwrap_or_else(|| "no token in response".to_string())
                ),
            }),
        }
    }

    /// GET an API path as JSON, re-authenticating once on 401
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.api_base, path);

        let mut reauthenticated = false;
        loop {
            let token = self.access_token().await?;
            let response = self.http.get(&url).bearer_auth(&token).send().await?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED && !reauthenticated {
                warn!("Reddit rejected the access token, re-authenticating");
                self.invalidate_token().await;
                reauthenticated = true;
                continue;
            }
            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(rate_limited(response.headers()));
            }
            if !status.is_success() {
                return Err(Error::Api {
                    status: status.as_u16(),
                    message: format!("GET {} failed", path),
                });
            }

            return Ok(response.json::<T>().await?);
        }
    }

    fn to_item(source: &str, post: RawPost) -> Item {
        let (media, attachments) = media::classify(&post);
        let url = if post.permalink.is_empty() {
            post.url.unwrap_or_default()
        } else {
            format!("https://www.reddit.com{}", post.permalink)
        };
        let author = if post.author == DELETED {
            String::new()
        } else {
            post.author
        };

        Item {
            id: post.id,
            source: source.to_string(),
            title: post.title,
            author,
            url,
            media,
            attachments,
            comments: Vec::new(),
            created_utc: post.created_utc as i64,
        }
    }
}

#[async_trait]
impl ContentSource for RedditClient {
    async fn fetch_latest(&self, source: &str, limit: u32) -> Result<Vec<Item>> {
        let path = format!(
            "/r/{}/new?limit={}&raw_json=1",
            urlencoding::encode(source),
            limit
        );

        let listing: Listing<RawPost> = with_retry(&self.retry, || self.get_json(&path))
            .await
            .map_err(|e| Error::source_unavailable(source, e))?;

        let items: Vec<Item> = listing
            .data
            .children
            .into_iter()
            .filter(|thing| thing.kind == "t3" && !thing.data.stickied && !thing.data.id.is_empty())
            .map(|thing| Self::to_item(source, thing.data))
            .collect();

        debug!(source = %source, count = items.len(), "Fetched listing");
        Ok(items)
    }

    async fn fetch_top_comments(&self, item: &Item, n: usize) -> Result<Vec<Comment>> {
        if n == 0 {
            return Ok(Vec::new());
        }

        // The listing limit also counts "more" stubs and stickied comments
        let path = format!(
            "/comments/{}?sort=top&limit={}&depth=1&raw_json=1",
            urlencoding::encode(&item.id),
            n + 5
        );

        let (_post, comments): (IgnoredAny, Listing<RawComment>) =
            with_retry(&self.retry, || self.get_json(&path))
                .await
                .map_err(|e| Error::comment_fetch(&item.id, e))?;

        let mut top: Vec<Comment> = comments
            .data
            .children
            .into_iter()
            .filter(|thing| thing.kind == "t1")
            .map(|thing| thing.data)
            .filter(|c| {
                !c.stickied
                    && c.author != DELETED
                    && !c.body.is_empty()
                    && c.body != DELETED
                    && c.body != "[removed]"
            })
            .map(|c| Comment {
                author: c.author,
                body: c.body,
                score: c.score,
            })
            .collect();

        top.sort_by(|a, b| b.score.cmp(&a.score));
        top.truncate(n);
        Ok(top)
    }
}

/// Build a rate-limit error from `Retry-After` or Reddit's reset header
fn rate_limited(headers: &HeaderMap) -> Error {
    let seconds = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(Duration::from_secs_f64)
    };

    Error::RateLimited {
        retry_after: seconds("retry-after").or_else(|| seconds("x-ratelimit-reset")),
    }
}
