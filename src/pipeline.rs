//! Per-item reporting: fetch → classify → format → deliver → record.
//!
//! Each new item goes through the steps below, in delivery order:
//!
//! 1. **Fetch** the article. On failure the item is skipped and *not*
//!    recorded, so the next run retries it.
//! 2. **Classify** it. On failure a degraded analysis is used instead; a
//!    minimal notification beats none.
//! 3. **Format and deliver**. On failure the item is not recorded.
//! 4. **Record** the id in the watermark right after a confirmed delivery,
//!    before the next item is touched.
//!
//! An item's failure never stops the items after it.

use crate::api::Classifier;
use crate::models::{AnalysisResult, CandidateItem};
use crate::outputs::Notifier;
use crate::outputs::discord::{Mentions, format_notification};
use crate::regions::RegionConfig;
use crate::scrapers::ArticleFetcher;
use crate::watermark::WatermarkStore;
use chrono::Utc;
use std::fmt;
use tracing::{error, info, instrument, warn};

/// What happened to one selected item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Delivered and recorded. `degraded` when the classifier failed.
    Delivered { degraded: bool },
    /// Recorded without delivery (seed mode).
    Seeded,
    /// Article could not be fetched; left for the next run.
    FetchFailed,
    /// Notification was not accepted; left for the next run.
    DeliveryFailed,
    /// Delivered, but the watermark write failed; the next run will deliver it again.
    RecordFailed,
    /// Recorded by another run after selection; not delivered again.
    AlreadyRecorded,
}

impl ItemOutcome {
    pub fn is_recorded(self) -> bool {
        matches!(
            self,
            ItemOutcome::Delivered { .. } | ItemOutcome::Seeded | ItemOutcome::AlreadyRecorded
        )
    }
}

impl fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ItemOutcome::Delivered { degraded: false } => "delivered",
            ItemOutcome::Delivered { degraded: true } => "delivered (degraded)",
            ItemOutcome::Seeded => "seeded",
            ItemOutcome::FetchFailed => "fetch failed",
            ItemOutcome::DeliveryFailed => "delivery failed",
            ItemOutcome::RecordFailed => "record failed",
            ItemOutcome::AlreadyRecorded => "already recorded",
        };
        f.write_str(s)
    }
}

/// Collaborators needed to report items. Borrowed for the duration of a run.
pub struct ReportPipeline<'a, F, C, N, W> {
    pub fetcher: &'a F,
    pub classifier: &'a C,
    pub notifier: &'a N,
    pub store: &'a W,
    pub mentions: &'a Mentions,
}

impl<'a, F, C, N, W> ReportPipeline<'a, F, C, N, W>
where
    F: ArticleFetcher,
    C: Classifier,
    N: Notifier,
    W: WatermarkStore,
{
    /// Report `items` one after another, in the given order.
    pub async fn report_all(
        &self,
        region: &RegionConfig,
        items: &[CandidateItem],
    ) -> Vec<(String, ItemOutcome)> {
        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            let outcome = self.report(region, item).await;
            outcomes.push((item.id.clone(), outcome));
        }
        outcomes
    }

    /// Run one item through fetch → classify → deliver → record.
    #[instrument(level = "info", skip_all, fields(region = %region.name(), id = %item.id))]
    pub async fn report(&self, region: &RegionConfig, item: &CandidateItem) -> ItemOutcome {
        // Overlapping runs share the watermark; re-check right before the work.
        if let Ok(true) = self.store.contains(region, &item.id).await {
            info!("Already recorded; skipping");
            return ItemOutcome::AlreadyRecorded;
        }

        let article = match self.fetcher.fetch_article(item).await {
            Ok(article) => article,
            Err(e) => {
                warn!(url = %item.url, error = %e, "Article fetch failed; will retry next run");
                return ItemOutcome::FetchFailed;
            }
        };

        let (analysis, degraded) = match self.classifier.classify(region, &article).await {
            Ok(analysis) => (analysis, false),
            Err(e) => {
                warn!(error = %e, "Classification failed; sending degraded report");
                (AnalysisResult::degraded(item, &article), true)
            }
        };

        let message = format_notification(region, item, &analysis, self.mentions, Utc::now());
        if let Err(e) = self.notifier.deliver(&message).await {
            warn!(error = %e, "Delivery failed; will retry next run");
            return ItemOutcome::DeliveryFailed;
        }

        match self.store.record(region, &item.id).await {
            Ok(()) => {
                info!(rank = %analysis.rank, degraded, "Item reported");
                ItemOutcome::Delivered { degraded }
            }
            Err(e) => {
                error!(error = %e, "Delivered but could not record id; it will be sent again");
                ItemOutcome::RecordFailed
            }
        }
    }

    /// Record `item` as seen without delivering it.
    #[instrument(level = "info", skip_all, fields(region = %region.name(), id = %item.id))]
    pub async fn seed(&self, region: &RegionConfig, item: &CandidateItem) -> ItemOutcome {
        match self.store.record(region, &item.id).await {
            Ok(()) => ItemOutcome::Seeded,
            Err(e) => {
                error!(error = %e, "Could not record id while seeding");
                ItemOutcome::RecordFailed
            }
        }
    }
}
