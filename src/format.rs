//! Message formatter
//!
//! Renders an [`Item`] as Telegram HTML:
//!
//! ```text
//! <b>New Post from r/aww</b>
//! <b>Title</b>: Look at this dog
//! <b>Author</b>: u/alice
//!
//! <b>Link</b>: <a href='https://www.reddit.com/r/aww/comments/abc/'>https://www.reddit.com/r/aww/comments/abc/</a>
//!
//! <b>Top Comments:</b>
//! <b>bob</b>: <code>what a good boy</code>
//! ```
//!
//! Output is deterministic and never fails; missing fields render as
//! placeholders.

use crate::types::{Comment, Item};

/// Comments shown per message
pub const MAX_COMMENTS: usize = 3;

/// Default display length of a comment body
pub const DEFAULT_COMMENT_CHARS: usize = 200;

const UNTITLED: &str = "[untitled]";
const DELETED: &str = "[deleted]";
const NO_LINK: &str = "[no link]";
const ELLIPSIS: char = '…';

/// Format an item with the default comment length
pub fn format(item: &Item) -> String {
    format_with_limit(item, DEFAULT_COMMENT_CHARS)
}

/// Format an item, truncating comment bodies to `comment_max_chars` characters
pub fn format_with_limit(item: &Item, comment_max_chars: usize) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "<b>New Post from r/{}</b>\n",
        escape_html(&item.source)
    ));
    out.push_str(&format!(
        "<b>Title</b>: {}\n",
        escape_html(or_placeholder(&item.title, UNTITLED))
    ));
    out.push_str(&format!(
        "<b>Author</b>: u/{}\n\n",
        escape_html(or_placeholder(&item.author, DELETED))
    ));

    let url = item.url.trim();
    if url.is_empty() {
        out.push_str(&format!("<b>Link</b>: {}\n", NO_LINK));
    } else {
        out.push_str(&format!(
            "<b>Link</b>: <a href='{}'>{}</a>\n",
            escape_attribute(url),
            escape_html(url)
        ));
    }

    let comments: Vec<&Comment> = item.comments.iter().take(MAX_COMMENTS).collect();
    if !comments.is_empty() {
        out.push_str("\n<b>Top Comments:</b>\n");
        for comment in comments {
            out.push_str(&format!(
                "<b>{}</b>: <code>{}</code>\n",
                escape_html(or_placeholder(&comment.author, DELETED)),
                escape_html(&truncate(comment.body.trim(), comment_max_chars))
            ));
        }
    }

    out.truncate(out.trim_end().len());
    out
}

/// Render an error report for the error topic
pub fn format_error_report(message: &str) -> String {
    format!(
        "<b>An error occurred</b>: <code>{}</code>",
        escape_html(message)
    )
}

/// Escape text for Telegram's HTML parse mode
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Escape text placed inside a single-quoted attribute
fn escape_attribute(text: &str) -> String {
    escape_html(text)
        .replace('\'', "&#39;")
        .replace('"', "&quot;")
}

/// Cut `text` to at most `max_chars` characters, marking the cut with an ellipsis
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((byte_index, _)) => {
            let mut cut = text[..byte_index].trim_end().to_string();
            cut.push(ELLIPSIS);
            cut
        }
    }
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() { placeholder } else { trimmed }
}
