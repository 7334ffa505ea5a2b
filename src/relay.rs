//! Scheduler loop
//!
//! A [`Relay`] alternates between running a pass over every route and
//! sleeping for the poll interval. Each route is an isolated unit:
//!
//! ```text
//! fetch → media filter → dedup → comments → format → send → record
//! ```
//!
//! A failing source is logged, reported to the error topic, and skipped until
//! the next pass. A failed delivery leaves the item unrecorded, so it is tried
//! again next pass. Keys are recorded only after the deliverer confirms, which
//! gives at-least-once delivery.

use crate::config::Config;
use crate::error::Result;
use crate::format::format_with_limit;
use crate::media::is_media_item;
use crate::reddit::ContentSource;
use crate::seen::SeenStore;
use crate::telegram::Deliverer;
use crate::types::{Item, Outgoing, PassReport, SourceRoute};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Polls every route and relays new media posts
pub struct Relay {
    routes: Vec<SourceRoute>,
    source: Arc<dyn ContentSource>,
    deliverer: Arc<dyn Deliverer>,
    seen: Arc<dyn SeenStore>,
    config: Config,
}

impl Relay {
    /// Create a relay over loaded routes and a loaded store
    pub fn new(
        routes: Vec<SourceRoute>,
        source: Arc<dyn ContentSource>,
        deliverer: Arc<dyn Deliverer>,
        seen: Arc<dyn SeenStore>,
        config: Config,
    ) -> Self {
        Self {
            routes,
            source,
            deliverer,
            seen,
            config,
        }
    }

    /// Routes this relay polls
    pub fn routes(&self) -> &[SourceRoute] {
        &self.routes
    }

    /// Run one pass over every route
    pub async fn run_pass(&self) -> PassReport {
        self.pass(&CancellationToken::new()).await
    }

    /// Run passes until `shutdown` is cancelled
    ///
    /// Cancellation is observed between sources and while sleeping; a source
    /// already in progress finishes first.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            sources = self.routes.len(),
            interval_secs = self.config.poll_interval.as_secs(),
            "Relay started"
        );

        while !shutdown.is_cancelled() {
            let report = self.pass(&shutdown).await;
            log_report(&report);

            debug!(
                sleep_secs = self.config.poll_interval.as_secs(),
                "Sleeping until next pass"
            );
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        info!("Relay stopped");
    }

    async fn pass(&self, shutdown: &CancellationToken) -> PassReport {
        let concurrency = self.config.max_concurrent_sources.max(1);

        let reports: Vec<PassReport> = stream::iter(self.routes.iter())
            .map(|route| async move {
                if shutdown.is_cancelled() {
                    return PassReport::default();
                }
                self.relay_source(route).await
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut total = PassReport::default();
        for report in reports {
            total.merge(report);
        }

        if let Err(e) = self.seen.flush().await {
            error!(error = %e, "Failed to flush seen items");
        }

        if let Some(retention) = self.config.seen_retention
            && let Err(e) = self.seen.prune(retention).await
        {
            warn!(error = %e, "Failed to prune seen items");
        }

        total
    }

    /// Process one route; never fails, failures land in the report
    async fn relay_source(&self, route: &SourceRoute) -> PassReport {
        let mut report = PassReport {
            sources: 1,
            ..Default::default()
        };

        if let Err(e) = self.process_items(route, &mut report).await {
            error!(source = %route.source, error = %e, "Source failed, skipping until next pass");
            report.failed_sources.push(route.source.clone());
            self.deliverer.report_error(&e.to_string()).await;
        }

        report
    }

    async fn process_items(&self, route: &SourceRoute, report: &mut PassReport) -> Result<()> {
        let items = self
            .source
            .fetch_latest(&route.source, self.config.fetch_limit)
            .await?;

        debug!(source = %route.source, fetched = items.len(), "Processing items");

        // Listings are newest first; deliver oldest first so the topic reads in order
        for item in items.into_iter().rev() {
            if !is_media_item(&item) {
                report.skipped_no_media += 1;
                continue;
            }

            let key = item.seen_key();
            if self.seen.contains(&key).await? {
                report.skipped_seen += 1;
                continue;
            }

            let message = self.prepare(item).await;
            match self.deliverer.send(route.topic_id, &message).await {
                Ok(()) => {
                    self.seen.record(&key).await?;
                    report.delivered += 1;
                    info!(source = %route.source, item_id = %key.item_id, topic_id = route.topic_id, "Delivered item");
                }
                Err(e) => {
                    warn!(source = %route.source, item_id = %key.item_id, error = %e, "Delivery failed, will retry next pass");
                    self.deliverer
                        .report_error(&format!("{} ({})", e, key))
                        .await;
                    report.failed_deliveries.push(key);
                }
            }
        }

        Ok(())
    }

    /// Attach top comments and render the message
    async fn prepare(&self, mut item: Item) -> Outgoing {
        item.comments = match self
            .source
            .fetch_top_comments(&item, self.config.comment_limit)
            .await
        {
            Ok(comments) => comments,
            Err(e) => {
                warn!(item_id = %item.id, error = %e, "Sending without comments");
                Vec::new()
            }
        };

        Outgoing {
            text: format_with_limit(&item, self.config.comment_max_chars),
            attachments: item.attachments,
        }
    }
}

fn log_report(report: &PassReport) {
    info!(
        sources = report.sources,
        delivered = report.delivered,
        skipped_seen = report.skipped_seen,
        skipped_no_media = report.skipped_no_media,
        failed_sources = report.failed_sources.len(),
        failed_deliveries = report.failed_deliveries.len(),
        "Pass complete"
    );
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
