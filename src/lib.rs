//! # subrelay
//!
//! Relays new media posts from subreddits into topics of a Telegram forum
//! group.
//!
//! Every pass walks the route list (`subreddit, topic_id`). For each
//! subreddit it fetches the newest posts and keeps those with an image,
//! video, or gallery. Posts already delivered are skipped. Each remaining
//! post is rendered with its top comments and sent to the route's topic.
//! Delivered posts are recorded in SQLite so restarts do not resend them.
//!
//! ## Quick Start
//!
//! ```no_run
//! use subrelay::{Config, Credentials, RelayService, run_with_shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let credentials = Credentials::from_env()?;
//!
//!     let service = RelayService::open(config, credentials).await?;
//!     run_with_shutdown(&service).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration and credentials
pub mod config;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Message formatting
pub mod format;
/// Media classification and filtering
pub mod media;
/// Reddit fetcher
pub mod reddit;
/// Polling loop
pub mod relay;
/// Retry logic with exponential backoff
pub mod retry;
/// Route file handling
pub mod routes;
/// Seen-item store
pub mod seen;
/// Telegram delivery
pub mod telegram;
/// Core types
pub mod types;

pub use config::{Config, Credentials, RetryConfig};
pub use db::Database;
pub use error::{DatabaseError, Error, Result};
pub use reddit::{ContentSource, RedditClient};
pub use relay::Relay;
pub use seen::{SeenItems, SeenStore};
pub use telegram::{Deliverer, TelegramClient};
pub use types::{Comment, Item, MediaKind, Outgoing, PassReport, SeenKey, SourceRoute};

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A relay wired to Reddit, Telegram, and the on-disk store
pub struct RelayService {
    relay: Relay,
    db: Arc<Database>,
}

impl RelayService {
    /// Validate config, load routes, open the store, and build both clients
    ///
    /// # Errors
    /// Fails on invalid configuration, an unreadable or malformed route file,
    /// or a database that cannot be opened.
    pub async fn open(config: Config, credentials: Credentials) -> Result<Self> {
        config.validate()?;

        let routes = routes::load(&config.routes_path).await?;
        if routes.is_empty() {
            tracing::warn!(path = %config.routes_path.display(), "No routes configured");
        }

        let db = Arc::new(Database::new(&config.database_path).await?);
        if db.was_unclean_shutdown().await? {
            tracing::warn!(
                "Previous run did not shut down cleanly; items sent just before it stopped may be delivered again"
            );
        }

        let seen = Arc::new(SeenItems::new(db.clone()));
        seen.load().await?;

        let source = Arc::new(RedditClient::new(&config, credentials.reddit)?);
        let deliverer = Arc::new(TelegramClient::new(&config, credentials.telegram)?);

        Ok(Self {
            relay: Relay::new(routes, source, deliverer, seen, config),
            db,
        })
    }

    /// The underlying relay
    pub fn relay(&self) -> &Relay {
        &self.relay
    }

    /// Run a single pass
    pub async fn run_once(&self) -> Result<PassReport> {
        self.db.set_clean_start().await?;
        let report = self.relay.run_pass().await;
        self.db.set_clean_shutdown().await?;
        Ok(report)
    }

    /// Run passes until `shutdown` fires, tracking clean shutdown in the database
    pub async fn run_until(&self, shutdown: CancellationToken) -> Result<()> {
        self.db.set_clean_start().await?;
        self.relay.run(shutdown).await;
        self.db.set_clean_shutdown().await?;
        tracing::info!("Shutdown complete");
        Ok(())
    }
}

/// Run the service until SIGTERM or SIGINT
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(service: &RelayService) -> Result<()> {
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.cancel();
    });

    service.run_until(shutdown).await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Received Ctrl+C signal");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
