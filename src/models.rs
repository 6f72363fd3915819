//! Data models shared by the scanner, the classifier and the notifier.
//!
//! - [`CandidateItem`]: a listing entry that may or may not be new
//! - [`Article`]: the fetched article text that is handed to the LLM
//! - [`AnalysisResult`]: the LLM classification, with a strict schema
//! - [`Rank`]: coarse importance, S highest
//!
//! None of these are persisted; only item ids end up in the watermark.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A scanner-produced reference to a possibly new article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateItem {
    /// Opaque identifier, compared only within one region's watermark.
    pub id: String,
    /// Canonical article URL.
    pub url: String,
    /// Preview image, when the listing provides one.
    pub image: Option<String>,
}

impl CandidateItem {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            image: None,
        }
    }
}

/// Full article content fetched for a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub url: String,
    pub title: Option<String>,
    pub text: String,
}

/// Importance assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Rank {
    S,
    A,
    B,
    C,
    /// No usable rank: the classifier failed or answered outside the scale.
    #[default]
    #[serde(rename = "?")]
    Unrated,
}

impl Rank {
    /// Lenient parse: trims, ignores case and a leading "rank".
    pub fn parse_lenient(raw: &str) -> Rank {
        let cleaned = raw.trim().to_ascii_uppercase();
        let cleaned = cleaned
            .strip_prefix("RANK")
            .unwrap_or(&cleaned)
            .trim_start_matches([':', ' '])
            .trim();
        match cleaned {
            "S" => Rank::S,
            "A" => Rank::A,
            "B" => Rank::B,
            "C" => Rank::C,
            _ => Rank::Unrated,
        }
    }

    /// Embed color for this rank.
    pub fn color(self) -> u32 {
        match self {
            Rank::S => 0xFFD700,
            Rank::A => 0xFF4500,
            Rank::B => 0xDA70D6,
            Rank::C => 0x5DADE2,
            Rank::Unrated => 0x99AAB5,
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Rank::S => "S",
            Rank::A => "A",
            Rank::B => "B",
            Rank::C => "C",
            Rank::Unrated => "?",
        };
        f.write_str(s)
    }
}

impl<'de> Deserialize<'de> for Rank {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(match value {
            serde_json::Value::String(s) => Rank::parse_lenient(&s),
            _ => Rank::Unrated,
        })
    }
}

/// Classification of one article.
///
/// Every field has a default so a partial LLM reply still deserializes;
/// the formatter never has to branch on a missing key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisResult {
    pub rank: Rank,
    pub title: String,
    pub summary: String,
    pub details: String,
    pub future: String,
    pub verdict: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub is_banner: bool,
}

impl AnalysisResult {
    /// Placeholder used when classification fails: neutral rank and a
    /// pointer to the source instead of a summary.
    pub fn degraded(item: &CandidateItem, article: &Article) -> Self {
        let title = article
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Новость #{}", item.id));
        Self {
            rank: Rank::Unrated,
            title,
            summary: "Автоматический анализ недоступен, подробности по ссылке на источник.".to_string(),
            details: "Не удалось получить разбор от ИИ.".to_string(),
            future: "—".to_string(),
            verdict: format!("Читайте оригинал: {}", item.url),
            is_banner: false,
        }
    }

    /// Whether this item warrants the extra banner ping.
    pub fn is_priority(&self) -> bool {
        self.is_banner || self.rank == Rank::S
    }
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1"),
        serde_json::Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    })
}
