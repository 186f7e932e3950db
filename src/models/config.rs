//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::RankingProfile;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Worker pool and paging behavior
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Snippet retrieval budgets
    #[serde(default)]
    pub snippets: SnippetConfig,

    /// Post-ranking coefficients
    #[serde(default)]
    pub ranking: RankingProfile,

    /// Words ignored when matching snippets
    #[serde(default = "defaults::stopwords")]
    pub stopwords: Vec<String>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetcher.take_timeout_ms == 0 {
            return Err(AppError::validation("fetcher.take_timeout_ms must be > 0"));
        }
        if self.fetcher.worker_lifetime_ms == 0 {
            return Err(AppError::validation(
                "fetcher.worker_lifetime_ms must be > 0",
            ));
        }
        if self.fetcher.liveness_window_ms == 0 {
            return Err(AppError::validation(
                "fetcher.liveness_window_ms must be > 0",
            ));
        }
        if self.fetcher.max_workers == 0 {
            return Err(AppError::validation("fetcher.max_workers must be > 0"));
        }
        if self.fetcher.complete_poll_interval_ms == 0 {
            return Err(AppError::validation(
                "fetcher.complete_poll_interval_ms must be > 0",
            ));
        }
        if self.snippets.max_length == 0 {
            return Err(AppError::validation("snippets.max_length must be > 0"));
        }
        if self.snippets.online_timeout_ms == 0
            || self.snippets.offline_timeout_ms == 0
            || self.snippets.media_timeout_ms == 0
        {
            return Err(AppError::validation("snippet timeouts must be > 0"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetcher: FetcherConfig::default(),
            snippets: SnippetConfig::default(),
            ranking: RankingProfile::default(),
            stopwords: defaults::stopwords(),
        }
    }
}

/// Worker pool and paging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Bounded wait for the next candidate before a worker gives up
    #[serde(default = "defaults::take_timeout")]
    pub take_timeout_ms: u64,

    /// Wall-clock lifetime of a worker
    #[serde(default = "defaults::worker_lifetime")]
    pub worker_lifetime_ms: u64,

    /// A running worker without a heartbeat in this window counts as dead
    #[serde(default = "defaults::liveness_window")]
    pub liveness_window_ms: u64,

    /// Upper bound of workers per deployment
    #[serde(default = "defaults::max_workers")]
    pub max_workers: usize,

    /// Extra text results fetched beyond the target
    #[serde(default = "defaults::result_overshoot")]
    pub result_overshoot: usize,

    /// Extra images fetched beyond the target
    #[serde(default = "defaults::image_overshoot")]
    pub image_overshoot: usize,

    /// Image shortfall tolerated before paging redeploys workers
    #[serde(default = "defaults::image_redeploy_slack")]
    pub image_redeploy_slack: usize,

    /// Fallback wake-up interval of `complete_results`
    #[serde(default = "defaults::complete_poll_interval")]
    pub complete_poll_interval_ms: u64,

    /// Fallback wake-up step of `one_result`, scaled by the position on the page
    #[serde(default = "defaults::page_poll_step")]
    pub page_poll_step_ms: u64,

    /// Run workers in offline snippet mode when online fetching is disabled
    #[serde(default)]
    pub offline_snippets: bool,
}

impl FetcherConfig {
    pub fn take_timeout(&self) -> Duration {
        Duration::from_millis(self.take_timeout_ms)
    }

    /// Worker lifetime, never below one second.
    pub fn worker_lifetime(&self) -> Duration {
        Duration::from_millis(self.worker_lifetime_ms.max(1000))
    }

    pub fn liveness_window(&self) -> Duration {
        Duration::from_millis(self.liveness_window_ms)
    }

    pub fn complete_poll_interval(&self) -> Duration {
        Duration::from_millis(self.complete_poll_interval_ms)
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            take_timeout_ms: defaults::take_timeout(),
            worker_lifetime_ms: defaults::worker_lifetime(),
            liveness_window_ms: defaults::liveness_window(),
            max_workers: defaults::max_workers(),
            result_overshoot: defaults::result_overshoot(),
            image_overshoot: defaults::image_overshoot(),
            image_redeploy_slack: defaults::image_redeploy_slack(),
            complete_poll_interval_ms: defaults::complete_poll_interval(),
            page_poll_step_ms: defaults::page_poll_step(),
            offline_snippets: false,
        }
    }
}

/// Snippet retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnippetConfig {
    /// Maximum length of a text snippet
    #[serde(default = "defaults::max_length")]
    pub max_length: usize,

    /// Text snippet budget when loading from the web
    #[serde(default = "defaults::online_timeout")]
    pub online_timeout_ms: u64,

    /// Text snippet ceiling for cache-only passes
    #[serde(default = "defaults::offline_timeout")]
    pub offline_timeout_ms: u64,

    /// Media snippet budget
    #[serde(default = "defaults::media_timeout")]
    pub media_timeout_ms: u64,
}

impl Default for SnippetConfig {
    fn default() -> Self {
        Self {
            max_length: defaults::max_length(),
            online_timeout_ms: defaults::online_timeout(),
            offline_timeout_ms: defaults::offline_timeout(),
            media_timeout_ms: defaults::media_timeout(),
        }
    }
}

mod defaults {
    // Fetcher defaults
    pub fn take_timeout() -> u64 {
        3000
    }
    pub fn worker_lifetime() -> u64 {
        10_000
    }
    pub fn liveness_window() -> u64 {
        3000
    }
    pub fn max_workers() -> usize {
        10
    }
    pub fn result_overshoot() -> usize {
        10
    }
    pub fn image_overshoot() -> usize {
        50
    }
    pub fn image_redeploy_slack() -> usize {
        30
    }
    pub fn complete_poll_interval() -> u64 {
        100
    }
    pub fn page_poll_step() -> u64 {
        10
    }

    // Snippet defaults
    pub fn max_length() -> usize {
        180
    }
    pub fn online_timeout() -> u64 {
        6000
    }
    pub fn offline_timeout() -> u64 {
        30_000
    }
    pub fn media_timeout() -> u64 {
        6000
    }

    pub fn stopwords() -> Vec<String> {
        [
            "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "is", "it",
            "of", "on", "or", "the", "to", "with",
        ]
        .iter()
        .map(|w| w.to_string())
        .collect()
    }
}
