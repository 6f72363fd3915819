//! Optional YAML settings file.
//!
//! ```yaml
//! news_role: "1440444308506280210"
//! banner_role: "1439787310831894679"
//! regions:
//!   global:
//!     index_url: "https://uma.kakaogames.com/news/"
//!     watermark_key: last_id_gl
//! ```
//!
//! Every key is optional; an absent file means built-in defaults.

use crate::error::ConfigError;
use crate::outputs::discord::Mentions;
use crate::regions::{Region, RegionConfig};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{info, instrument};
use url::Url;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(flatten)]
    pub mentions: Mentions,
    pub regions: HashMap<Region, RegionOverride>,
}

/// Per-region overrides of the built-in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RegionOverride {
    pub index_url: Option<String>,
    pub watermark_key: Option<String>,
}

impl Settings {
    /// Read settings from `path`, or defaults when no path is given.
    #[instrument(level = "info")]
    pub fn load(path: Option<&str>) -> Result<Settings, ConfigError> {
        let Some(path) = path else {
            return Ok(Settings::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Load {
            what: "settings",
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        let settings = Settings::parse(&raw).map_err(|e| ConfigError::Load {
            what: "settings",
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        info!(overrides = settings.regions.len(), "Loaded settings");
        Ok(settings)
    }

    pub fn parse(raw: &str) -> Result<Settings, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Settings::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Built-in configuration of `region` with this file's overrides applied.
    pub fn resolve(&self, region: Region) -> Result<RegionConfig, ConfigError> {
        let mut config = RegionConfig::default_for(region);
        let Some(overrides) = self.regions.get(&region) else {
            return Ok(config);
        };

        if let Some(raw) = &overrides.index_url {
            let url = Url::parse(raw).map_err(|e| ConfigError::Invalid {
                name: "regions.*.index_url",
                reason: format!("{raw}: {e}"),
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ConfigError::Invalid {
                    name: "regions.*.index_url",
                    reason: format!("{raw}: not an http(s) URL"),
                });
            }
            config.index_url = url;
        }

        if let Some(key) = &overrides.watermark_key {
            let key = key.trim();
            if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
                return Err(ConfigError::Invalid {
                    name: "regions.*.watermark_key",
                    reason: format!("{key:?} is not a plain file name"),
                });
            }
            config.watermark_key = key.to_string();
        }
        Ok(config)
    }
}
