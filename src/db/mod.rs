//! Database layer for subrelay
//!
//! Handles SQLite persistence for the seen-item set and runtime state.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`]: Database lifecycle, schema migrations
//! - [`seen`]: Delivered-item keys used for deduplication
//! - [`state`]: Runtime state (shutdown tracking)

use sqlx::{FromRow, sqlite::SqlitePool};

mod migrations;
mod seen;
mod state;

/// Seen item record from database
#[derive(Debug, Clone, FromRow)]
pub struct SeenRow {
    /// Source the item came from
    pub source: String,
    /// Item id within the source
    pub item_id: String,
    /// Unix timestamp when the item was recorded as delivered
    pub seen_at: i64,
}

/// Database handle for subrelay
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
