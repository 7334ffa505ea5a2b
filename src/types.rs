//! Core types shared across the relay pipeline

use serde::{Deserialize, Serialize};
use std::fmt;

/// A monitored source and the forum topic its posts are delivered to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRoute {
    /// Source identifier (lowercase subreddit name, without the `r/` prefix)
    pub source: String,

    /// Destination topic (Telegram `message_thread_id`) inside the group
    pub topic_id: i64,
}

impl SourceRoute {
    /// Create a route, normalizing the source name
    pub fn new(source: impl AsRef<str>, topic_id: i64) -> Self {
        Self {
            source: normalize_source(source.as_ref()),
            topic_id,
        }
    }
}

/// Normalize a subreddit name: trim, drop an `r/` prefix, lowercase
pub fn normalize_source(name: &str) -> String {
    let name = name.trim();
    let name = name
        .strip_prefix("/r/")
        .or_else(|| name.strip_prefix("r/"))
        .unwrap_or(name);
    name.to_lowercase()
}

/// Broad media classification used by the media filter
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Single still or animated image
    Image,
    /// Hosted or native video
    Video,
    /// Multi-image gallery
    Gallery,
    /// Text, link, or anything without supported media
    #[default]
    None,
}

/// How a single media URL should be delivered
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    /// Still image (`sendPhoto`)
    Photo,
    /// Video (`sendVideo`)
    Video,
    /// GIF or animated image (`sendAnimation`)
    Animation,
}

/// A concrete media URL extracted from a post
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttachment {
    /// Direct media URL, query string stripped
    pub url: String,
    /// Delivery kind
    pub kind: AttachmentKind,
}

impl MediaAttachment {
    /// Create an attachment
    pub fn new(url: impl Into<String>, kind: AttachmentKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }
}

/// A comment on an item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Comment author (username without `u/`)
    pub author: String,
    /// Comment body (raw text)
    pub body: String,
    /// Net score
    #[serde(default)]
    pub score: i64,
}

impl Comment {
    /// Create a comment with a zero score
    pub fn new(author: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            body: body.into(),
            score: 0,
        }
    }
}

/// One unit of content fetched from a source
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Source-unique identifier (Reddit base36 post id)
    pub id: String,
    /// Source the item was fetched from
    pub source: String,
    /// Post title
    pub title: String,
    /// Author username; empty for deleted accounts
    pub author: String,
    /// Permalink to the post
    pub url: String,
    /// Media classification
    pub media: MediaKind,
    /// Extracted media URLs, empty when `media` is `None`
    #[serde(default)]
    pub attachments: Vec<MediaAttachment>,
    /// Top comments, filled in just before formatting
    #[serde(default)]
    pub comments: Vec<Comment>,
    /// Creation time (unix seconds)
    #[serde(default)]
    pub created_utc: i64,
}

impl Item {
    /// Dedup key for this item
    pub fn seen_key(&self) -> SeenKey {
        SeenKey::new(&self.source, &self.id)
    }
}

/// Composite dedup key: item ids are only unique within a source
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeenKey {
    /// Source identifier
    pub source: String,
    /// Item identifier within the source
    pub item_id: String,
}

impl SeenKey {
    /// Create a key
    pub fn new(source: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            item_id: item_id.into(),
        }
    }
}

impl fmt::Display for SeenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source, self.item_id)
    }
}

/// A message ready to hand to a [`Deliverer`](crate::telegram::Deliverer)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outgoing {
    /// Rendered HTML text, used as the message body or media caption
    pub text: String,
    /// Media to attach; empty sends a plain text message
    pub attachments: Vec<MediaAttachment>,
}

/// Outcome counters for one relay pass
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    /// Number of sources processed
    pub sources: usize,
    /// Items delivered and recorded
    pub delivered: usize,
    /// Items skipped because they were already seen
    pub skipped_seen: usize,
    /// Items skipped by the media filter
    pub skipped_no_media: usize,
    /// Sources whose fetch failed
    pub failed_sources: Vec<String>,
    /// Items whose delivery failed (left unseen for the next pass)
    pub failed_deliveries: Vec<SeenKey>,
}

impl PassReport {
    /// Fold another report into this one
    pub fn merge(&mut self, other: PassReport) {
        self.sources += other.sources;
        self.delivered += other.delivered;
        self.skipped_seen += other.skipped_seen;
        self.skipped_no_media += other.skipped_no_media;
        self.failed_sources.extend(other.failed_sources);
        self.failed_deliveries.extend(other.failed_deliveries);
    }
}
