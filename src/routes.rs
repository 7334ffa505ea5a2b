//! Source registry: the subreddit → topic route file
//!
//! The file is line-oriented, one route per line:
//!
//! ```text
//! # subreddit, topic id
//! aww, 789
//! unixporn, 123
//! ```
//!
//! Blank lines and lines starting with `#` are ignored. Routes keep file order.

use crate::error::{Error, Result};
use crate::types::{SourceRoute, normalize_source};
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Subreddit names: 2-21 chars of letters, digits, underscore
#[allow(clippy::unwrap_used)] // literal pattern
fn source_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z0-9_]{2,21}$").unwrap()
    })
}

/// Check that a normalized source name looks like a subreddit
pub fn validate_source_name(name: &str) -> Result<()> {
    if source_name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(Error::config(format!("invalid subreddit name '{}'", name)))
    }
}

/// Parse route file contents
///
/// `origin` names the file in error messages (e.g. `subreddits.db:4`).
pub fn parse(contents: &str, origin: &str) -> Result<Vec<SourceRoute>> {
    let mut routes = Vec::new();
    let mut seen = HashSet::new();

    for (index, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let location = format!("{}:{}", origin, index + 1);
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != 2 {
            return Err(Error::config_at(
                location,
                format!(
                    "expected 'subreddit, topic_id', found {} field(s)",
                    fields.len()
                ),
            ));
        }

        let source = normalize_source(fields[0]);
        if source.is_empty() {
            return Err(Error::config_at(location, "empty subreddit name"));
        }

        let topic_raw = fields[1].trim();
        let topic_id = topic_raw.parse::<i64>().map_err(|_| {
            Error::config_at(
                location.clone(),
                format!("topic id '{}' is not an integer", topic_raw),
            )
        })?;

        if !seen.insert(source.clone()) {
            return Err(Error::config_at(
                location,
                format!("duplicate route for r/{}", source),
            ));
        }

        debug!(source = %source, topic_id, "Parsed route");
        routes.push(SourceRoute { source, topic_id });
    }

    Ok(routes)
}

/// Load routes from a file
pub async fn load(path: &Path) -> Result<Vec<SourceRoute>> {
    let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
        Error::config_at(
            path.display().to_string(),
            format!("failed to read route file: {}", e),
        )
    })?;

    let routes = parse(&contents, &path.display().to_string())?;
    info!(path = %path.display(), count = routes.len(), "Loaded source routes");
    Ok(routes)
}

/// Append a route to the file, creating it if needed
///
/// The name is validated and duplicates of existing routes are refused.
/// The file is opened, appended to, and closed for this single write.
pub async fn append(path: &Path, route: &SourceRoute) -> Result<()> {
    validate_source_name(&route.source)?;

    let existing = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(Error::Io(e)),
    };

    let routes = parse(&existing, &path.display().to_string())?;
    if routes.iter().any(|r| r.source == route.source) {
        return Err(Error::config(format!(
            "r/{} is already routed",
            route.source
        )));
    }

    let mut line = String::new();
    if !existing.is_empty() && !existing.ends_with('\n') {
        line.push('\n');
    }
    line.push_str(&format!("{},{}\n", route.source, route.topic_id));

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;

    info!(source = %route.source, topic_id = route.topic_id, "Added route");
    Ok(())
}
