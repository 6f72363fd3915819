//! Discord webhook notifications.
//!
//! Builds the webhook payload for one classified item and delivers it.
//!
//! # Payload
//!
//! ```text
//! content:  📢 header with the region and role pings
//! embed:    rank + headline as title
//!           summary, analysis, prediction and verdict, then a source link
//!           color by rank, optional preview image
//!           footer "Region: <name> | ID: <id>", delivery timestamp
//! ```
//!
//! Delivery is a single bounded POST. Retrying is left to the next run: an
//! undelivered item is not recorded in the watermark.

use super::Notifier;
use crate::error::DeliveryError;
use crate::models::{AnalysisResult, CandidateItem};
use crate::regions::RegionConfig;
use crate::utils::{truncate_chars, truncate_for_log};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use url::Url;

/// Discord caps embed titles at 256 and descriptions at 4096 characters.
const MAX_TITLE_CHARS: usize = 256;
const MAX_DESCRIPTION_CHARS: usize = 4096;

/// Role ids pinged by notifications.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Mentions {
    /// Pinged on every news item.
    pub news_role: String,
    /// Additionally pinged for banners and rank S items.
    pub banner_role: String,
}

impl Default for Mentions {
    fn default() -> Self {
        Self {
            news_role: "1440444308506280210".to_string(),
            banner_role: "1439787310831894679".to_string(),
        }
    }
}

/// Webhook request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationMessage {
    pub content: String,
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedImage>,
    pub footer: EmbedFooter,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedImage {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

/// Build the notification for one item.
pub fn format_notification(
    region: &RegionConfig,
    item: &CandidateItem,
    analysis: &AnalysisResult,
    mentions: &Mentions,
    now: DateTime<Utc>,
) -> NotificationMessage {
    let mut ping = format!("<@&{}>", mentions.news_role);
    if analysis.is_priority() {
        ping.push_str(&format!(" <@&{}>", mentions.banner_role));
    }

    let description = format!(
        "**{summary}**\n\n\
         ╭─── ⭐ **АНАЛИЗ ({region})**\n\
         │ {details}\n\
         │\n\
         │ ▸ **ПРЕДСКАЗАНИЕ / СЛИВЫ**\n\
         │ 🔮 {future}\n\
         │\n\
         │ ▸ **ВЕРДИКТ ТРЕНЕРА**\n\
         │ ✅ {verdict}\n\
         ╰─── 🔗 [ИСТОЧНИК]({url})",
        summary = analysis.summary,
        region = region.name(),
        details = analysis.details,
        future = analysis.future,
        verdict = analysis.verdict,
        url = item.url,
    );

    let embed = Embed {
        title: truncate_chars(
            &format!("— ✦ RANK: {} | {} ✦ —", analysis.rank, analysis.title),
            MAX_TITLE_CHARS,
        ),
        description: fit_description(description, &item.url),
        color: analysis.rank.color(),
        image: item.image.clone().map(|url| EmbedImage { url }),
        footer: EmbedFooter {
            text: format!("Region: {} | ID: {}", region.name(), item.id),
        },
        timestamp: now.to_rfc3339_opts(SecondsFormat::Secs, true),
    };

    NotificationMessage {
        content: format!(
            "📢 **НОВЫЙ ОТЧЕТ: РЕГИОН {}**\n{}",
            region.name().to_uppercase(),
            ping
        ),
        embeds: vec![embed],
    }
}

/// Keep the description within Discord's limit without losing the source link.
fn fit_description(description: String, url: &str) -> String {
    if description.chars().count() <= MAX_DESCRIPTION_CHARS {
        return description;
    }
    let link = format!("…\n╰─── 🔗 [ИСТОЧНИК]({url})");
    let budget = MAX_DESCRIPTION_CHARS.saturating_sub(link.chars().count());
    format!("{}{}", truncate_chars(&description, budget), link)
}

/// [`Notifier`] posting to a Discord webhook.
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    client: reqwest::Client,
    webhook: Url,
}

impl DiscordNotifier {
    pub fn new(client: reqwest::Client, webhook: Url) -> Self {
        Self { client, webhook }
    }
}

impl Notifier for DiscordNotifier {
    #[instrument(level = "info", skip_all, fields(footer = ?message.embeds.first().map(|e| &e.footer.text)))]
    async fn deliver(&self, message: &NotificationMessage) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(self.webhook.clone())
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %truncate_for_log(&body, 300), "Webhook rejected message");
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body: truncate_for_log(&body, 300),
            });
        }
        info!(status = status.as_u16(), "Notification delivered");
        Ok(())
    }
}
