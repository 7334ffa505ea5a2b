//! Delivery client for the Telegram Bot API
//!
//! Every message goes to one forum group; the topic (`message_thread_id`)
//! comes from the item's route. Media is passed to Telegram by URL and
//! Telegram fetches it.
//!
//! Method selection:
//! - no attachments, or text longer than a caption may be → `sendMessage`
//! - one attachment → `sendPhoto` / `sendVideo` / `sendAnimation`
//! - several → `sendMediaGroup`, caption on the first entry

use crate::config::{Config, RetryConfig, TelegramCredentials};
use crate::error::{Error, Result};
use crate::format::format_error_report;
use crate::retry::{IsRetryable, with_retry};
use crate::types::{AttachmentKind, MediaAttachment, Outgoing};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Longest caption Telegram accepts on a media message
pub const MAX_CAPTION_CHARS: usize = 1024;

/// Most entries Telegram accepts in one media group
pub const MAX_GROUP_ITEMS: usize = 10;

const PARSE_MODE: &str = "HTML";

/// Where formatted messages go
#[async_trait]
pub trait Deliverer: Send + Sync {
    /// Deliver `message` to `topic_id`
    ///
    /// Any failure is reported as [`Error::Delivery`]; on error the caller
    /// must treat the message as not delivered.
    async fn send(&self, topic_id: i64, message: &Outgoing) -> Result<()>;

    /// Best-effort report of an operational error; never fails
    async fn report_error(&self, _message: &str) {}
}

#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    chat_id: i64,
    message_thread_id: i64,
    text: &'a str,
    parse_mode: &'static str,
}

#[derive(Debug, Serialize)]
struct MediaMessage<'a> {
    chat_id: i64,
    message_thread_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    photo: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    video: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    animation: Option<&'a str>,
    caption: &'a str,
    parse_mode: &'static str,
}

#[derive(Debug, Serialize)]
struct MediaGroupMessage<'a> {
    chat_id: i64,
    message_thread_id: i64,
    media: Vec<InputMedia<'a>>,
}

#[derive(Debug, Serialize)]
struct InputMedia<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    media: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
}

/// Envelope of every Bot API response
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiResponse {
    ok: bool,
    error_code: Option<u16>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

/// Telegram Bot API client bound to one group
pub struct TelegramClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
    group_id: i64,
    error_topic_id: Option<i64>,
    retry: RetryConfig,
}

impl TelegramClient {
    /// Create a client for the configured group
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &Config, credentials: TelegramCredentials) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: config
                .endpoints
                .telegram_api_base
                .trim_end_matches('/')
                .to_string(),
            bot_token: credentials.bot_token,
            group_id: credentials.group_id,
            error_topic_id: credentials.error_topic_id,
            retry: config.retry.clone(),
        })
    }

    /// POST one Bot API method, mapping `ok: false` and HTTP errors to [`Error`]
    async fn call<P: Serialize + Sync>(&self, method: &str, payload: &P) -> Result<()> {
        let url = format!("{}/bot{}/{}", self.api_base, self.bot_token, method);
        let response = self.http.post(&url).json(payload).send().await?;
        let status = response.status();

        // Error bodies are JSON too; a non-JSON body is judged by status alone
        let body: ApiResponse = response.json().await.unwrap_or_default();

        if status.as_u16() == 429 || body.error_code == Some(429) {
            return Err(Error::RateLimited {
                retry_after: body
                    .parameters
                    .and_then(|p| p.retry_after)
                    .map(Duration::from_secs),
            });
        }

        if !status.is_success() || !body.ok {
            return Err(Error::Api {
                status: body.error_code.unwrap_or(status.as_u16()),
                message: body
                    .description
                    .unwrap_or_else(|| format!("{} failed", method)),
            });
        }

        debug!(method, "Telegram call succeeded");
        Ok(())
    }

    async fn call_with_retry<P: Serialize + Sync>(&self, method: &str, payload: &P) -> Result<()> {
        with_retry(&self.retry, || self.call(method, payload)).await
    }

    async fn send_text(&self, topic_id: i64, text: &str) -> Result<()> {
        let payload = TextMessage {
            chat_id: self.group_id,
            message_thread_id: topic_id,
            text,
            parse_mode: PARSE_MODE,
        };
        self.call_with_retry("sendMessage", &payload).await
    }

    async fn send_single(
        &self,
        topic_id: i64,
        attachment: &MediaAttachment,
        caption: &str,
    ) -> Result<()> {
        let url = Some(attachment.url.as_str());
        let (method, photo, video, animation) = match attachment.kind {
            AttachmentKind::Photo => ("sendPhoto", url, None, None),
            AttachmentKind::Video => ("sendVideo", None, url, None),
            AttachmentKind::Animation => ("sendAnimation", None, None, url),
        };

        let payload = MediaMessage {
            chat_id: self.group_id,
            message_thread_id: topic_id,
            photo,
            video,
            animation,
            caption,
            parse_mode: PARSE_MODE,
        };
        self.call_with_retry(method, &payload).await
    }

    async fn send_group(
        &self,
        topic_id: i64,
        attachments: &[MediaAttachment],
        caption: &str,
    ) -> Result<()> {
        if attachments.len() > MAX_GROUP_ITEMS {
            debug!(
                total = attachments.len(),
                kept = MAX_GROUP_ITEMS,
                "Trimming media group"
            );
        }

        let media = attachments
            .iter()
            .take(MAX_GROUP_ITEMS)
            .enumerate()
            .map(|(index, attachment)| InputMedia {
                // Groups take only photo/video/document/audio
                kind: match attachment.kind {
                    AttachmentKind::Photo => "photo",
                    AttachmentKind::Video | AttachmentKind::Animation => "video",
                },
                media: attachment.url.as_str(),
                caption: (index == 0).then_some(caption),
                parse_mode: (index == 0).then_some(PARSE_MODE),
            })
            .collect();

        let payload = MediaGroupMessage {
            chat_id: self.group_id,
            message_thread_id: topic_id,
            media,
        };
        self.call_with_retry("sendMediaGroup", &payload).await
    }

    async fn send_media(&self, topic_id: i64, message: &Outgoing) -> Result<()> {
        match message.attachments.as_slice() {
            [single] => self.send_single(topic_id, single, &message.text).await,
            many => self.send_group(topic_id, many, &message.text).await,
        }
    }
}

#[async_trait]
impl Deliverer for TelegramClient {
    async fn send(&self, topic_id: i64, message: &Outgoing) -> Result<()> {
        let too_long = message.text.chars().count() > MAX_CAPTION_CHARS;
        if message.attachments.is_empty() || too_long {
            return self
                .send_text(topic_id, &message.text)
                .await
                .map_err(|e| Error::delivery(topic_id, e));
        }

        match self.send_media(topic_id, message).await {
            Ok(()) => Ok(()),
            // Telegram refuses some URLs (size, format, hotlink); the text still goes out
            Err(e) if !e.is_retryable() && matches!(e, Error::Api { .. }) => {
                warn!(topic_id, error = %e, "Media rejected, falling back to text message");
                self.send_text(topic_id, &message.text)
                    .await
                    .map_err(|fallback| Error::delivery(topic_id, fallback))
            }
            Err(e) => Err(Error::delivery(topic_id, e)),
        }
    }

    async fn report_error(&self, message: &str) {
        let Some(topic_id) = self.error_topic_id else {
            return;
        };

        let text = format_error_report(message);
        if let Err(e) = self.send_text(topic_id, &text).await {
            error!(error = %e, "Failed to report error to Telegram");
        }
    }
}
