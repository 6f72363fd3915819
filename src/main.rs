//! # Tracen News
//!
//! A polling job that watches the Umamusume news listings of each configured
//! region, asks an LLM to rank and summarize every article it has not
//! reported before, and posts the result to a Discord channel.
//!
//! ## Usage
//!
//! ```sh
//! GROQ_API_KEY=... DISCORD_WEBHOOK=... tracen_news --state-dir ./state
//! ```
//!
//! The process is meant to be started periodically by an external scheduler
//! (cron, CI schedule). Each invocation loads state, acts and exits.
//!
//! ## Architecture
//!
//! For each region, sequentially:
//! 1. **Scanning**: read the listing page into candidate items
//! 2. **Selecting**: drop candidates already in the region's watermark
//! 3. **Reporting**: fetch, classify, post and record each new item in
//!    chronological order
//!
//! Missing secrets abort the run before any scan. Everything else is logged
//! and isolated to the region or item it happened in.

use awful_aj::config_dir;
use clap::Parser;
use std::error::Error;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod error;
mod models;
mod outputs;
mod pipeline;
mod regions;
mod runner;
mod scrapers;
mod selector;
mod settings;
#[cfg(test)]
mod testing;
mod utils;
mod watermark;

use api::{AwfulAsk, LlmClassifier, RetryAsk};
use cli::Cli;
use config::AppConfig;
use error::ConfigError;
use outputs::discord::DiscordNotifier;
use pipeline::ReportPipeline;
use runner::RegionRunner;
use scrapers::article::HttpArticleFetcher;
use scrapers::listing::HttpScanner;
use utils::{ensure_writable_dir, http_client};
use watermark::FileWatermarkStore;

/// Retries per LLM request before the item falls back to a degraded report.
const LLM_MAX_RETRIES: usize = 3;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = Instant::now();
    info!("tracen_news starting up");

    let args = Cli::parse();
    debug!(state_dir = %args.state_dir, regions = ?args.regions, seed = args.seed, "Parsed CLI arguments");

    let config = match startup(&args).await {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Configuration error; nothing was scanned");
            return Err(e.into());
        }
    };
    let classifier = match load_classifier(&config).await {
        Ok(classifier) => classifier,
        Err(e) => {
            error!(error = %e, "Configuration error; nothing was scanned");
            return Err(e.into());
        }
    };

    let client = http_client(config.http_timeout)?;
    let scanner = HttpScanner::new(client.clone(), config.max_candidates);
    let fetcher = HttpArticleFetcher::new(client.clone());
    let notifier = DiscordNotifier::new(client, config.webhook.clone());
    let store = FileWatermarkStore::new(&config.state_dir, config.watermark_cap);

    let runner = RegionRunner {
        scanner: &scanner,
        pipeline: ReportPipeline {
            fetcher: &fetcher,
            classifier: &classifier,
            notifier: &notifier,
            store: &store,
            mentions: &config.mentions,
        },
        mode: config.mode,
    };

    let reports = runner.run_regions(&config.regions, config.region_delay).await;
    let reported: usize = reports.iter().map(|r| r.recorded()).sum();
    let failed: usize = reports.iter().map(|r| r.failed()).sum();

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        regions = config.regions.len(),
        skipped_regions = config.regions.len() - reports.len(),
        reported,
        failed,
        "Execution complete"
    );
    Ok(())
}

/// Validate configuration and make sure the state directory is usable.
#[instrument(level = "info", skip_all)]
async fn startup(args: &Cli) -> Result<AppConfig, ConfigError> {
    let config = AppConfig::from_cli(args)?;
    if let Err(e) = ensure_writable_dir(&config.state_dir).await {
        return Err(ConfigError::Invalid {
            name: "state-dir",
            reason: format!("{} is not writable: {e}", config.state_dir),
        });
    }
    info!(
        regions = ?config.regions.iter().map(|r| r.name()).collect::<Vec<_>>(),
        state_dir = %config.state_dir,
        mode = ?config.mode,
        "Configuration loaded"
    );
    Ok(config)
}

/// Load the LLM client config and chat template; the API key from the
/// environment replaces the one in the file.
#[instrument(level = "info", skip_all)]
async fn load_classifier(config: &AppConfig) -> Result<LlmClassifier<RetryAsk<AwfulAsk>>, ConfigError> {
    let config_path = match &config.llm_config {
        Some(path) => path.clone(),
        None => config_dir()
            .map_err(|e| ConfigError::Load {
                what: "LLM config directory",
                path: "<awful_aj config dir>".to_string(),
                reason: e.to_string(),
            })?
            .join("config.yaml")
            .to_string_lossy()
            .into_owned(),
    };

    let mut llm_config =
        awful_aj::config::load_config(&config_path).map_err(|e| ConfigError::Load {
            what: "LLM config",
            path: config_path.clone(),
            reason: e.to_string(),
        })?;
    llm_config.api_key = config.api_key.clone();
    info!(config_path = %config_path, "Loaded LLM configuration");

    let template = awful_aj::template::load_template(config.template.as_str())
        .await
        .map_err(|e| ConfigError::Load {
            what: "LLM template",
            path: config.template.clone(),
            reason: e.to_string(),
        })?;
    info!(template = %config.template, "Loaded template");

    if config.mode == runner::RunMode::Seed {
        warn!("Seed mode: new items will be recorded without being posted");
    }

    Ok(LlmClassifier::new(
        RetryAsk::new(
            AwfulAsk::new(llm_config, template),
            LLM_MAX_RETRIES,
            Duration::from_secs(1),
        ),
        config.llm_timeout,
    ))
}
