//! Seen-item store used for deduplication
//!
//! [`SeenItems`] mirrors the `seen_items` table in memory so the relay can
//! answer `contains` without a query per item. Every `record` commits its row
//! before returning, so an acknowledged record is never lost on a crash and
//! `flush` only has to checkpoint the write-ahead log.

use crate::db::Database;
use crate::error::Result;
use crate::types::SeenKey;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Durable set of delivered item keys
///
/// Implementations must tolerate concurrent callers; the relay may process
/// several sources at once.
#[async_trait]
pub trait SeenStore: Send + Sync {
    /// Populate the store from its persisted backing
    async fn load(&self) -> Result<()>;

    /// Whether the key has been recorded
    async fn contains(&self, key: &SeenKey) -> Result<bool>;

    /// Record a key as delivered (idempotent)
    async fn record(&self, key: &SeenKey) -> Result<()>;

    /// Make every recorded key durable
    async fn flush(&self) -> Result<()>;

    /// Forget keys recorded longer ago than `older_than`, returning how many
    ///
    /// Pruned items may be delivered again if a source still lists them.
    async fn prune(&self, _older_than: Duration) -> Result<u64> {
        Ok(0)
    }
}

/// SQLite-backed [`SeenStore`] with an in-memory mirror
pub struct SeenItems {
    db: Arc<Database>,
    keys: RwLock<HashSet<SeenKey>>,
}

impl SeenItems {
    /// Create a store over an open database; call [`SeenStore::load`] before use
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            keys: RwLock::new(HashSet::new()),
        }
    }

    /// Number of keys currently held in memory
    pub async fn len(&self) -> usize {
        self.keys.read().await.len()
    }

    /// Whether no keys are held in memory
    pub async fn is_empty(&self) -> bool {
        self.keys.read().await.is_empty()
    }
}

#[async_trait]
impl SeenStore for SeenItems {
    async fn load(&self) -> Result<()> {
        let rows = self.db.get_seen_items().await?;
        let loaded: HashSet<SeenKey> = rows
            .into_iter()
            .map(|row| SeenKey::new(row.source, row.item_id))
            .collect();

        info!(count = loaded.len(), "Loaded seen items");
        *self.keys.write().await = loaded;
        Ok(())
    }

    async fn contains(&self, key: &SeenKey) -> Result<bool> {
        Ok(self.keys.read().await.contains(key))
    }

    async fn record(&self, key: &SeenKey) -> Result<()> {
        // Commit first: the in-memory set must never claim a key the database lacks
        self.db.mark_item_seen(key).await?;
        self.keys.write().await.insert(key.clone());
        debug!(key = %key, "Recorded seen item");
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.db.checkpoint().await
    }

    async fn prune(&self, older_than: Duration) -> Result<u64> {
        let cutoff = chrono::Utc::now().timestamp() - older_than.as_secs() as i64;
        let removed = self.db.delete_seen_before(cutoff).await?;
        if removed > 0 {
            info!(removed, "Pruned old seen items");
            self.load().await?;
        }
        Ok(removed)
    }
}
