//! Wire models for the Reddit JSON API
//!
//! Only the fields the relay reads are modeled. Everything is defaulted so a
//! post missing optional data still deserializes.

use serde::Deserialize;
use std::collections::HashMap;

/// `{"kind": "Listing", "data": {...}}` wrapper
#[derive(Debug, Deserialize)]
pub(crate) struct Listing<T> {
    pub data: ListingData<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListingData<T> {
    #[serde(default = "Vec::new")]
    pub children: Vec<Thing<T>>,
}

/// A typed child (`t1` comment, `t3` link, `more` placeholder)
#[derive(Debug, Deserialize)]
pub(crate) struct Thing<T> {
    pub kind: String,
    pub data: T,
}

/// OAuth token response
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// A submission as returned by listing endpoints
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawPost {
    /// Base36 post id
    pub id: String,
    /// Subreddit name as Reddit spells it
    pub subreddit: String,
    /// Post title
    pub title: String,
    /// Author name, `[deleted]` for removed accounts
    pub author: String,
    /// Path relative to reddit.com
    pub permalink: String,
    /// Link target; for media posts this is the media URL
    pub url: Option<String>,
    /// Set on native Reddit video posts
    pub is_video: bool,
    /// Embedded media description
    pub media: Option<RawMedia>,
    /// Gallery ordering
    pub gallery_data: Option<GalleryData>,
    /// Gallery entries keyed by media id
    pub media_metadata: Option<HashMap<String, MediaMetadata>>,
    /// Creation time (unix seconds)
    pub created_utc: f64,
    /// Pinned by moderators
    pub stickied: bool,
}

/// `media` object of a post
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawMedia {
    /// Native video details
    pub reddit_video: Option<RedditVideo>,
}

/// Native video details
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct RedditVideo {
    /// Direct MP4 URL (video track only)
    pub fallback_url: Option<String>,
}

/// Gallery ordering
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct GalleryData {
    /// Entries in display order
    pub items: Vec<GalleryItem>,
}

/// One gallery slot
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct GalleryItem {
    /// Key into `media_metadata`
    pub media_id: String,
}

/// Metadata for one gallery entry
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct MediaMetadata {
    /// Entry type: `Image`, `AnimatedImage`, `RedditVideo`
    pub e: Option<String>,
    /// Source rendition
    pub s: Option<MediaSource>,
}

/// Source rendition URLs of a gallery entry
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct MediaSource {
    /// Still image URL
    pub u: Option<String>,
    /// GIF rendition of an animated entry
    pub gif: Option<String>,
    /// MP4 rendition of an animated or video entry
    pub mp4: Option<String>,
}

/// A comment as returned by the comments endpoint
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawComment {
    pub author: String,
    pub body: String,
    pub score: i64,
    pub stickied: bool,
}
