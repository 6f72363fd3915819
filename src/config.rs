//! Validated runtime configuration.
//!
//! [`AppConfig::from_cli`] is the only place where configuration can fail.
//! Any error here aborts the process before a single region is scanned.

use crate::cli::Cli;
use crate::error::ConfigError;
use crate::outputs::discord::Mentions;
use crate::regions::{Region, RegionConfig};
use crate::runner::RunMode;
use crate::settings::Settings;
use itertools::Itertools;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub webhook: Url,
    pub state_dir: String,
    pub regions: Vec<RegionConfig>,
    pub watermark_cap: usize,
    pub max_candidates: usize,
    pub region_delay: Duration,
    pub http_timeout: Duration,
    pub llm_timeout: Duration,
    pub llm_config: Option<String>,
    pub template: String,
    pub mentions: Mentions,
    pub mode: RunMode,
}

impl AppConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let settings = Settings::load(cli.settings.as_deref())?;
        Self::from_parts(cli, settings)
    }

    fn from_parts(cli: &Cli, settings: Settings) -> Result<Self, ConfigError> {
        let api_key = required(&cli.api_key, "GROQ_API_KEY")?;
        let webhook_raw = required(&cli.webhook_url, "DISCORD_WEBHOOK")?;
        let webhook = Url::parse(&webhook_raw).map_err(|e| ConfigError::Invalid {
            name: "DISCORD_WEBHOOK",
            reason: e.to_string(),
        })?;
        if !matches!(webhook.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                name: "DISCORD_WEBHOOK",
                reason: "not an http(s) URL".to_string(),
            });
        }

        if cli.watermark_cap == 0 {
            return Err(ConfigError::Invalid {
                name: "watermark-cap",
                reason: "must be at least 1".to_string(),
            });
        }
        // A listing longer than the watermark would evict ids that are still
        // listed, and those would be reported again.
        if cli.max_candidates == 0 || cli.max_candidates > cli.watermark_cap {
            return Err(ConfigError::Invalid {
                name: "max-candidates",
                reason: format!(
                    "must be between 1 and watermark-cap ({}), got {}",
                    cli.watermark_cap, cli.max_candidates
                ),
            });
        }

        let selected: Vec<Region> = if cli.regions.is_empty() {
            Region::ALL.to_vec()
        } else {
            cli.regions.iter().copied().unique().collect()
        };
        let regions = selected
            .into_iter()
            .map(|region| settings.resolve(region))
            .collect::<Result<Vec<_>, _>>()?;
        if !regions.iter().map(|r| &r.watermark_key).all_unique() {
            return Err(ConfigError::Invalid {
                name: "regions.*.watermark_key",
                reason: "two regions share a watermark key".to_string(),
            });
        }

        Ok(Self {
            api_key,
            webhook,
            state_dir: cli.state_dir.clone(),
            regions,
            watermark_cap: cli.watermark_cap,
            max_candidates: cli.max_candidates,
            region_delay: Duration::from_secs(cli.region_delay_secs),
            http_timeout: Duration::from_secs(cli.http_timeout_secs.max(1)),
            llm_timeout: Duration::from_secs(cli.llm_timeout_secs.max(1)),
            llm_config: cli.llm_config.clone(),
            template: cli.template.clone(),
            mentions: settings.mentions,
            mode: if cli.seed { RunMode::Seed } else { RunMode::Report },
        })
    }
}

fn required(value: &Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ConfigError::Missing(name))
}
