//! Command-line interface definitions for Tracen News.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Secrets and paths can be provided via command-line flags or environment
//! variables.

use crate::regions::Region;
use clap::Parser;

/// Command-line arguments for one polling run.
///
/// # Examples
///
/// ```sh
/// # Both regions, secrets from the environment
/// GROQ_API_KEY=... DISCORD_WEBHOOK=... tracen_news --state-dir ./state
///
/// # Japan only, first deploy: remember the current listing without posting
/// tracen_news --region japan --seed
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// API key of the classification LLM
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Discord webhook URL notifications are posted to
    #[arg(long, env = "DISCORD_WEBHOOK", hide_env_values = true)]
    pub webhook_url: Option<String>,

    /// Directory holding the per-region watermark files
    #[arg(short, long, env = "TRACEN_STATE_DIR", default_value = ".")]
    pub state_dir: String,

    /// Regions to poll, in order (repeatable)
    #[arg(short, long = "region", value_enum)]
    pub regions: Vec<Region>,

    /// Number of reported ids remembered per region
    #[arg(long, default_value_t = crate::watermark::DEFAULT_CAPACITY)]
    pub watermark_cap: usize,

    /// Newest listing entries considered per run (must not exceed --watermark-cap)
    #[arg(long, default_value_t = 10)]
    pub max_candidates: usize,

    /// Pause between regions, in seconds
    #[arg(long, default_value_t = 3)]
    pub region_delay_secs: u64,

    /// Timeout of every HTTP request (scan, fetch, delivery), in seconds
    #[arg(long, default_value_t = 20)]
    pub http_timeout_secs: u64,

    /// Timeout of one classification including retries, in seconds
    #[arg(long, default_value_t = 60)]
    pub llm_timeout_secs: u64,

    /// Path to the LLM client config.yaml (defaults to the awful_aj config dir)
    #[arg(long)]
    pub llm_config: Option<String>,

    /// Name of the LLM chat template
    #[arg(long, default_value = "tracen_classifier")]
    pub template: String,

    /// Optional YAML settings file (role ids, region overrides)
    #[arg(long, env = "TRACEN_SETTINGS")]
    pub settings: Option<String>,

    /// Record new items as seen without classifying or posting them
    #[arg(long)]
    pub seed: bool,
}
