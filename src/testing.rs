//! In-memory collaborators for unit tests.

use crate::api::Classifier;
use crate::error::{ClassificationError, DeliveryError, FetchError, ScanError};
use crate::models::{AnalysisResult, Article, CandidateItem, Rank};
use crate::outputs::Notifier;
use crate::outputs::discord::NotificationMessage;
use crate::regions::RegionConfig;
use crate::scrapers::{ArticleFetcher, RegionScanner};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;

/// Returns a fixed candidate list, or a scan error when `items` is `None`.
#[derive(Debug, Default)]
pub struct FakeScanner {
    pub items: Option<Vec<CandidateItem>>,
    pub calls: Cell<usize>,
}

impl FakeScanner {
    pub fn with_ids(ids: &[&str]) -> Self {
        let items = ids
            .iter()
            .map(|id| CandidateItem::new(*id, format!("https://example.com/news/{id}")))
            .collect();
        Self {
            items: Some(items),
            calls: Cell::new(0),
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }
}

impl RegionScanner for FakeScanner {
    async fn scan(&self, _region: &RegionConfig) -> Result<Vec<CandidateItem>, ScanError> {
        self.calls.set(self.calls.get() + 1);
        self.items
            .clone()
            .ok_or_else(|| ScanError::Network("connection refused".to_string()))
    }
}

/// Serves a short article for every item except those in `fail_ids`.
#[derive(Debug, Default)]
pub struct FakeFetcher {
    pub fail_ids: HashSet<String>,
}

impl ArticleFetcher for FakeFetcher {
    async fn fetch_article(&self, item: &CandidateItem) -> Result<Article, FetchError> {
        if self.fail_ids.contains(&item.id) {
            return Err(FetchError::Status(500));
        }
        Ok(Article {
            url: item.url.clone(),
            title: Some(format!("Article {}", item.id)),
            text: format!("Body of article {}", item.id),
        })
    }
}

/// Answers with a fixed rank, or fails every call.
#[derive(Debug)]
pub struct FakeClassifier {
    rank: Option<Rank>,
}

impl FakeClassifier {
    pub fn ranked(rank: Rank) -> Self {
        Self { rank: Some(rank) }
    }

    pub fn failing() -> Self {
        Self { rank: None }
    }
}

impl Classifier for FakeClassifier {
    async fn classify(
        &self,
        _region: &RegionConfig,
        article: &Article,
    ) -> Result<AnalysisResult, ClassificationError> {
        let rank = self
            .rank
            .ok_or_else(|| ClassificationError::Request("503 service unavailable".to_string()))?;
        Ok(AnalysisResult {
            rank,
            title: article.title.clone().unwrap_or_default(),
            summary: "summary".to_string(),
            details: "details".to_string(),
            future: "future".to_string(),
            verdict: "verdict".to_string(),
            is_banner: false,
        })
    }
}

/// Keeps every accepted message; rejects messages for ids in `fail_ids`.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub sent: RefCell<Vec<NotificationMessage>>,
    pub fail_ids: HashSet<String>,
}

impl RecordingNotifier {
    /// Ids of accepted messages, read back from the embed footer.
    pub fn delivered_ids(&self) -> Vec<String> {
        self.sent.borrow().iter().map(footer_id).collect()
    }
}

fn footer_id(message: &NotificationMessage) -> String {
    message
        .embeds
        .first()
        .and_then(|e| e.footer.text.rsplit("ID: ").next())
        .unwrap_or_default()
        .to_string()
}

impl Notifier for RecordingNotifier {
    async fn deliver(&self, message: &NotificationMessage) -> Result<(), DeliveryError> {
        if self.fail_ids.contains(&footer_id(message)) {
            return Err(DeliveryError::Rejected {
                status: 500,
                body: "internal error".to_string(),
            });
        }
        self.sent.borrow_mut().push(message.clone());
        Ok(())
    }
}
