//! Article page fetcher.

use super::ArticleFetcher;
use crate::error::FetchError;
use crate::models::{Article, CandidateItem};
use crate::utils::{collapse_whitespace, truncate_chars};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, instrument};

/// Upper bound on article text sent to the classifier, in characters.
pub const MAX_ARTICLE_CHARS: usize = 6000;

static OG_TITLE: Lazy<Selector> = Lazy::new(|| static_selector(r#"meta[property="og:title"]"#));
static TITLE: Lazy<Selector> = Lazy::new(|| static_selector("title"));
static H1: Lazy<Selector> = Lazy::new(|| static_selector("h1"));
static CONTENT_ROOTS: Lazy<Vec<Selector>> = Lazy::new(|| {
    ["article", "main", ".news-detail", "body"]
        .into_iter()
        .map(static_selector)
        .collect()
});

fn static_selector(raw: &str) -> Selector {
    Selector::parse(raw).unwrap_or_else(|e| unreachable!("static selector {raw}: {e:?}"))
}

/// [`ArticleFetcher`] that downloads the article page over HTTP.
#[derive(Debug, Clone)]
pub struct HttpArticleFetcher {
    client: reqwest::Client,
}

impl HttpArticleFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl ArticleFetcher for HttpArticleFetcher {
    #[instrument(level = "info", skip_all, fields(id = %item.id, url = %item.url))]
    async fn fetch_article(&self, item: &CandidateItem) -> Result<Article, FetchError> {
        let response = self.client.get(&item.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        let article = extract_article(&item.url, &body)?;
        info!(chars = article.text.chars().count(), title = ?article.title, "Parsed article");
        Ok(article)
    }
}

/// Extract the title and readable text of an article page.
pub fn extract_article(url: &str, html: &str) -> Result<Article, FetchError> {
    let document = Html::parse_document(html);

    let title = document
        .select(&OG_TITLE)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .map(collapse_whitespace)
        .or_else(|| first_text(&document, &TITLE))
        .or_else(|| first_text(&document, &H1))
        .filter(|t| !t.is_empty());

    let text = CONTENT_ROOTS
        .iter()
        .find_map(|selector| {
            document
                .select(selector)
                .next()
                .map(visible_text)
                .filter(|t| !t.is_empty())
        })
        .ok_or(FetchError::Empty)?;

    Ok(Article {
        url: url.to_string(),
        title,
        text: truncate_chars(&text, MAX_ARTICLE_CHARS),
    })
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
}

/// Text of `root` without script, style and noscript contents.
fn visible_text(root: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name().to_string()))
            .is_some_and(|name| matches!(name.as_str(), "script" | "style" | "noscript"));
        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }
    collapse_whitespace(&out)
}
