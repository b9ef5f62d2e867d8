//! Application settings loaded from config.toml
//!
//! Every section is optional; a missing file or a missing key falls back to the
//! defaults the backoffice has always used (30% minimum similarity, ten ranked
//! candidates, five import suggestions). Secrets for the place-search function
//! come from the environment so they never land in the TOML file.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Matching thresholds
    pub matching: MatchingConfig,
    /// Feed location used by the batch job
    pub feed: FeedConfig,
    /// Remote place-search function
    pub search: SearchConfig,
}

/// Thresholds used by the place matcher
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum similarity (0-100) for a ranked candidate
    pub min_score: u8,
    /// Maximum number of ranked candidates returned by a search
    pub max_results: usize,
    /// Maximum number of suggestions stored on an imported item
    pub suggestion_limit: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            min_score: 30,
            max_results: 10,
            suggestion_limit: 5,
        }
    }
}

/// Feed settings for the batch job
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// File path or URL imported when `COUPON_FEED_SOURCE` is not set
    pub default_source: Option<String>,
}

/// Place-search function endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Function URL, overridden by `PLACE_SEARCH_URL`
    pub url: Option<String>,
    /// Bearer key, only ever read from `PLACE_SEARCH_API_KEY`
    #[serde(skip)]
    pub api_key: Option<String>,
}

/// Loads configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A key has the wrong type
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    parse_config(&contents)
}

/// Parses configuration from TOML text.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads `./config.toml` when present, otherwise the defaults, then applies
/// environment overrides.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path = Path::new("config.toml");
    let mut config = if path.exists() {
        tracing::debug!("Loading configuration from {:?}", path);
        load_config(path)?
    } else {
        tracing::info!("No config.toml found, using default settings");
        AppConfig::default()
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(url) = std::env::var("PLACE_SEARCH_URL") {
        config.search.url = Some(url);
    }
    config.search.api_key = std::env::var("PLACE_SEARCH_API_KEY").ok();
}
