//! Media filter
//!
//! Decides whether a post carries deliverable media and extracts the concrete
//! URLs. Rules are checked in order and the first match wins:
//!
//! 1. native video with a fallback URL
//! 2. gfycat / redgifs links and `.gifv` URLs (video)
//! 3. `.gif` URLs (animation)
//! 4. galleries
//! 5. direct `i.redd.it` / `preview.redd.it` images
//!
//! Anything else is [`MediaKind::None`] and gets dropped by the relay.

use crate::reddit::RawPost;
use crate::types::{AttachmentKind, Item, MediaAttachment, MediaKind};
use regex::Regex;
use std::sync::OnceLock;

const VIDEO_HOSTS: &[&str] = &["gfycat.com", "redgifs.com"];

#[allow(clippy::unwrap_used)] // literal pattern
fn direct_image_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^https?://(i\.redd\.it|preview\.redd\.it)/.*\.(jpg|jpeg|png)$").unwrap()
    })
}

/// True iff the item carries image, video, or gallery media
pub fn is_media_item(item: &Item) -> bool {
    item.media != MediaKind::None
}

/// Classify a post and extract its media attachments
///
/// Returns `(MediaKind::None, [])` when no rule matches or a gallery has no
/// usable entries.
pub fn classify(post: &RawPost) -> (MediaKind, Vec<MediaAttachment>) {
    if post.is_video
        && let Some(url) = post
            .media
            .as_ref()
            .and_then(|m| m.reddit_video.as_ref())
            .and_then(|v| v.fallback_url.as_deref())
            .filter(|u| !u.is_empty())
    {
        return (
            MediaKind::Video,
            vec![MediaAttachment::new(strip_query(url), AttachmentKind::Video)],
        );
    }

    let url = post.url.as_deref().unwrap_or_default();

    if VIDEO_HOSTS.iter().any(|host| url.contains(host)) || url.ends_with(".gifv") {
        return (
            MediaKind::Video,
            vec![MediaAttachment::new(url, AttachmentKind::Video)],
        );
    }

    if url.ends_with(".gif") {
        return (
            MediaKind::Image,
            vec![MediaAttachment::new(url, AttachmentKind::Animation)],
        );
    }

    if let (Some(gallery), Some(metadata)) = (&post.gallery_data, &post.media_metadata)
        && !gallery.items.is_empty()
    {
        let attachments: Vec<MediaAttachment> = gallery
            .items
            .iter()
            .filter_map(|entry| metadata.get(&entry.media_id))
            .filter_map(|meta| {
                let source = meta.s.as_ref()?;
                let best = [&source.u, &source.gif, &source.mp4]
                    .into_iter()
                    .flatten()
                    .find(|u| !u.is_empty())?;
                let kind = match meta.e.as_deref().map(str::to_lowercase).as_deref() {
                    Some("redditvideo") => AttachmentKind::Video,
                    Some("animatedimage") => AttachmentKind::Animation,
                    _ => AttachmentKind::Photo,
                };
                Some(MediaAttachment::new(strip_query(best), kind))
            })
            .collect();

        if attachments.is_empty() {
            return (MediaKind::None, Vec::new());
        }
        return (MediaKind::Gallery, attachments);
    }

    if direct_image_pattern().is_match(url) {
        return (
            MediaKind::Image,
            vec![MediaAttachment::new(url, AttachmentKind::Photo)],
        );
    }

    (MediaKind::None, Vec::new())
}

fn strip_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}
