//! News site scrapers.
//!
//! Scraping follows the same two-phase pattern for every region:
//!
//! 1. **Scanning** ([`listing`]): read the region's news listing and turn
//!    each entry into a [`CandidateItem`]
//! 2. **Fetching** ([`article`]): download one article and extract its
//!    title and readable text for the classifier
//!
//! Per-site differences (selectors, image availability, listing order) live
//! in [`crate::regions::ListingStrategy`], so both phases are shared code.
//!
//! The two traits below are the seams the runner depends on; tests replace
//! them with in-memory fakes.

pub mod article;
pub mod listing;

use crate::error::{FetchError, ScanError};
use crate::models::{Article, CandidateItem};
use crate::regions::RegionConfig;
use url::Url;

/// Produces the current candidate items of a region, oldest first.
pub trait RegionScanner {
    async fn scan(&self, region: &RegionConfig) -> Result<Vec<CandidateItem>, ScanError>;
}

/// Retrieves the full content of one candidate.
pub trait ArticleFetcher {
    async fn fetch_article(&self, item: &CandidateItem) -> Result<Article, FetchError>;
}

/// Query parameters that carry an article id.
const ID_PARAMS: &[&str] = &["id", "seq", "no", "article_id", "idx"];

/// Derive a stable item id from an article link.
///
/// Uses a query parameter named like an id (`detail.php?id=1234&lang=ja` ->
/// `1234`), otherwise the last query value, otherwise the last non-empty path
/// segment (`/news/1234/` -> `1234`), otherwise the whole URL.
pub fn item_id_from_url(url: &Url) -> String {
    let query: Vec<_> = url
        .query_pairs()
        .filter(|(_, value)| !value.trim().is_empty())
        .collect();
    let named = query
        .iter()
        .find(|(key, _)| ID_PARAMS.contains(&key.to_ascii_lowercase().as_str()));
    if let Some((_, value)) = named.or(query.last()) {
        return value.trim().to_string();
    }
    let last_segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last());
    if let Some(segment) = last_segment {
        return urlencoding::decode(segment)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| segment.to_string());
    }
    url.to_string()
}
