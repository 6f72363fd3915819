//! Listing page scanner.
//!
//! Reads a region's news listing and returns the newest `max_candidates`
//! entries, oldest first. Links are resolved against the listing URL, so
//! relative `href`s like `/news/detail.php?id=1` become absolute.

use super::{RegionScanner, item_id_from_url};
use crate::error::ScanError;
use crate::models::CandidateItem;
use crate::regions::{ListingStrategy, RegionConfig};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::cmp::Reverse;
use tracing::{debug, info, instrument, warn};
use url::Url;

static LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").unwrap_or_else(|e| unreachable!("static selector: {e:?}")));
static IMAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img").unwrap_or_else(|e| unreachable!("static selector: {e:?}")));

/// [`RegionScanner`] that scrapes the region's listing over HTTP.
#[derive(Debug, Clone)]
pub struct HttpScanner {
    client: reqwest::Client,
    max_candidates: usize,
}

impl HttpScanner {
    pub fn new(client: reqwest::Client, max_candidates: usize) -> Self {
        Self {
            client,
            max_candidates,
        }
    }
}

impl RegionScanner for HttpScanner {
    #[instrument(level = "info", skip_all, fields(region = %region.name(), url = %region.index_url))]
    async fn scan(&self, region: &RegionConfig) -> Result<Vec<CandidateItem>, ScanError> {
        let response = self.client.get(region.index_url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Status(status.as_u16()));
        }
        let html = response.text().await?;

        let items = parse_listing(
            &html,
            &region.index_url,
            region.region.listing_strategy(),
            self.max_candidates,
        );
        info!(count = items.len(), "Scanned listing");
        debug!(ids = ?items.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(), "Candidate ids");
        Ok(items)
    }
}

/// Parse a listing page into candidates, oldest first, keeping at most
/// `max` of the newest entries.
pub fn parse_listing(
    html: &str,
    base: &Url,
    strategy: ListingStrategy,
    max: usize,
) -> Vec<CandidateItem> {
    let document = Html::parse_document(html);

    let mut entries = Vec::new();
    for raw in strategy.item_selectors {
        let selector = match Selector::parse(raw) {
            Ok(s) => s,
            Err(e) => {
                warn!(selector = *raw, error = ?e, "Invalid listing selector");
                continue;
            }
        };
        entries = document
            .select(&selector)
            .filter_map(|el| parse_entry(el, base, strategy.has_preview_image))
            .collect::<Vec<_>>();
        if !entries.is_empty() {
            break;
        }
    }

    // Numeric ids grow with publication; page order may put pinned entries first.
    if entries.iter().all(|e| e.id.parse::<u64>().is_ok()) {
        entries.sort_by_cached_key(|e| Reverse(e.id.parse::<u64>().ok()));
    } else if !strategy.newest_first {
        entries.reverse();
    }
    // newest first from here on
    entries.truncate(max);
    entries.reverse();
    entries
}

fn parse_entry(el: ElementRef<'_>, base: &Url, with_image: bool) -> Option<CandidateItem> {
    let href = match el.value().name() {
        "a" => el.value().attr("href"),
        _ => el.select(&LINK).next().and_then(|a| a.value().attr("href")),
    };
    let href = href?;
    let url = base.join(href.trim()).ok()?;

    let image = if with_image {
        el.select(&IMAGE)
            .next()
            .and_then(|img| img.value().attr("src").or_else(|| img.value().attr("data-src")))
            .and_then(|src| base.join(src.trim()).ok())
            .map(|u| u.to_string())
    } else {
        None
    };

    let mut item = CandidateItem::new(item_id_from_url(&url), url);
    item.image = image;
    Some(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regions::{Region, RegionConfig};
    use crate::utils::http_client;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const JAPAN_LISTING: &str = r#"
        <ul class="news-list">
          <li class="news-list__item"><a href="/news/detail.php?id=103"><img src="/img/103.png">Newest</a></li>
          <li class="news-list__item"><a href="/news/detail.php?id=102">Middle</a></li>
          <li class="news-list__item"><a href="/news/detail.php?id=101"><img data-src="https://cdn.example.com/101.png">Oldest</a></li>
        </ul>"#;

    const GLOBAL_LISTING: &str = r#"
        <div class="news_item"><a href="https://uma.kakaogames.com/news/9">Nine</a></div>
        <div class="news_item"><a href="https://uma.kakaogames.com/news/8">Eight</a></div>
        <div class="news_item"><span>no link</span></div>"#;

    fn base(region: Region) -> Url {
        Url::parse(region.default_index_url()).unwrap()
    }

    #[test]
    fn test_japan_listing_oldest_first_with_images() {
        let items = parse_listing(
            JAPAN_LISTING,
            &base(Region::Japan),
            Region::Japan.listing_strategy(),
            10,
        );
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["101", "102", "103"]);
        assert_eq!(items[0].image.as_deref(), Some("https://cdn.example.com/101.png"));
        assert_eq!(items[1].image, None);
        assert_eq!(items[2].url, "https://umamusume.jp/news/detail.php?id=103");
        assert_eq!(items[2].image.as_deref(), Some("https://umamusume.jp/img/103.png"));
    }

    #[test]
    fn test_max_keeps_newest() {
        let items = parse_listing(
            JAPAN_LISTING,
            &base(Region::Japan),
            Region::Japan.listing_strategy(),
            2,
        );
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["102", "103"]);
    }

    #[test]
    fn test_global_fallback_selector_without_images() {
        let items = parse_listing(
            GLOBAL_LISTING,
            &base(Region::Global),
            Region::Global.listing_strategy(),
            10,
        );
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["8", "9"]);
        assert!(items.iter().all(|i| i.image.is_none()));
    }

    #[test]
    fn test_numeric_ids_override_page_order() {
        let pinned_first = r#"
            <li class="news-list__item"><a href="/news/detail.php?id=90">Pinned</a></li>
            <li class="news-list__item"><a href="/news/detail.php?id=112">Newest</a></li>
            <li class="news-list__item"><a href="/news/detail.php?id=111">Older</a></li>"#;
        let items = parse_listing(
            pinned_first,
            &base(Region::Japan),
            Region::Japan.listing_strategy(),
            2,
        );
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["111", "112"]);
    }

    #[test]
    fn test_non_numeric_ids_keep_page_order() {
        let slugs = r#"
            <div class="news_item"><a href="/news/summer-event">Newest</a></div>
            <div class="news_item"><a href="/news/maintenance">Older</a></div>"#;
        let items = parse_listing(
            slugs,
            &base(Region::Global),
            Region::Global.listing_strategy(),
            10,
        );
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["maintenance", "summer-event"]);
    }

    #[test]
    fn test_unrecognized_page_yields_nothing() {
        let items = parse_listing(
            "<html><body><p>maintenance</p></body></html>",
            &base(Region::Japan),
            Region::Japan.listing_strategy(),
            10,
        );
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_http_scanner_reads_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/news/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(JAPAN_LISTING))
            .mount(&server)
            .await;

        let mut region = RegionConfig::default_for(Region::Japan);
        region.index_url = Url::parse(&format!("{}/news/", server.uri())).unwrap();
        let scanner = HttpScanner::new(reqwest::Client::new(), 10);

        let items = scanner.scan(&region).await.unwrap();
        assert_eq!(items.len(), 3);
        assert!(items[0].url.starts_with(&server.uri()));
    }

    #[tokio::test]
    async fn test_http_scanner_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let mut region = RegionConfig::default_for(Region::Global);
        region.index_url = Url::parse(&server.uri()).unwrap();
        let scanner = HttpScanner::new(reqwest::Client::new(), 10);

        let err = scanner.scan(&region).await.unwrap_err();
        assert!(matches!(err, ScanError::Status(503)));
    }

    #[tokio::test]
    async fn test_http_scanner_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(JAPAN_LISTING)
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let mut region = RegionConfig::default_for(Region::Japan);
        region.index_url = Url::parse(&server.uri()).unwrap();
        let scanner = HttpScanner::new(http_client(Duration::from_millis(200)).unwrap(), 10);

        let err = scanner.scan(&region).await.unwrap_err();
        assert!(matches!(err, ScanError::Network(_)), "unexpected error: {err}");
    }
}
