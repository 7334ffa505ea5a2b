//! Reddit and Telegram response fixtures

use serde_json::{Value, json};

/// A `t3` child for a direct image post
pub fn image_post(subreddit: &str, id: &str, created_utc: f64) -> Value {
    json!({
        "kind": "t3",
        "data": {
            "id": id,
            "subreddit": subreddit,
            "title": format!("Post {}", id),
            "author": "alice",
            "permalink": format!("/r/{}/comments/{}/post/", subreddit, id),
            "url": format!("https://i.redd.it/{}.jpg", id),
            "is_video": false,
            "created_utc": created_utc
        }
    })
}

/// A `t3` child for a self post with no media
pub fn text_post(subreddit: &str, id: &str) -> Value {
    json!({
        "kind": "t3",
        "data": {
            "id": id,
            "subreddit": subreddit,
            "title": "Discussion thread",
            "author": "bob",
            "permalink": format!("/r/{}/comments/{}/discussion/", subreddit, id),
            "url": format!("https://www.reddit.com/r/{}/comments/{}/discussion/", subreddit, id),
            "is_self": true,
            "created_utc": 1700000000.0
        }
    })
}

/// Wrap children in a listing envelope
pub fn listing(children: Vec<Value>) -> Value {
    json!({"kind": "Listing", "data": {"after": null, "children": children}})
}

/// Comments endpoint response with the given `(author, body, score)` comments
pub fn comments(post_id: &str, entries: &[(&str, &str, i64)]) -> Value {
    let children: Vec<Value> = entries
        .iter()
        .map(|(author, body, score)| {
            json!({"kind": "t1", "data": {"author": author, "body": body, "score": score}})
        })
        .collect();

    json!([
        listing(vec![json!({"kind": "t3", "data": {"id": post_id}})]),
        listing(children)
    ])
}

pub fn token() -> Value {
    json!({"access_token": "integration-token", "token_type": "bearer", "expires_in": 86400})
}

pub fn telegram_ok() -> Value {
    json!({"ok": true, "result": {"message_id": 1}})
}
