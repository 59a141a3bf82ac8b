//! Run configuration: topic table, quotas, retry tuning, strictness policy.
//!
//! Configuration is loaded from an optional YAML file; every field has a
//! default so a bare `newsdesk --output-dir ./site` run works out of the
//! box. The default topic table mirrors the production schedule this tool
//! was built for: a gaming/tech/world mix curated for a UK audience.

use crate::models::Topic;
use serde::Deserialize;
use std::error::Error;
use std::path::Path;
use tracing::info;

/// Validation strictness for raw oracle story records.
///
/// Pipeline deployments disagree on how much to trust the oracle's output
/// discipline, so the stricter checks are opt-in rather than hard-coded.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StrictnessPolicy {
    /// Drop stories whose summary has at least this many words.
    pub max_summary_words: Option<usize>,
    /// Drop stories whose source lacks a `"Outlet: basis"` separator.
    pub require_source_separator: bool,
}

impl Default for StrictnessPolicy {
    fn default() -> Self {
        Self {
            max_summary_words: None,
            require_source_separator: false,
        }
    }
}

/// Full run configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Ordered topic table; order matters for fallback selection.
    pub topics: Vec<Topic>,
    /// Per-topic generation quota (overgeneration cap, not the final quota).
    pub stories_per_topic: usize,
    /// Acquisition attempts per topic before giving up on its shortfall.
    pub max_tries: usize,
    /// Hard cap on the final story set size.
    pub target_total: usize,
    /// How many days of prior runs feed the history digest.
    pub lookback_days: i64,
    /// Flat delay between acquisition retries, seconds.
    pub retry_delay_secs: u64,
    /// Delay between per-story expansion calls, seconds.
    pub expand_delay_secs: u64,
    pub strictness: StrictnessPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            topics: default_topics(),
            stories_per_topic: 8,
            max_tries: 3,
            target_total: 20,
            lookback_days: 14,
            retry_delay_secs: 2,
            expand_delay_secs: 1,
            strictness: StrictnessPolicy::default(),
        }
    }
}

impl RunConfig {
    /// Load configuration from an optional YAML file.
    ///
    /// `None` yields the built-in defaults. A path that does not exist or
    /// does not parse is a startup error: a misconfigured scheduled run
    /// should fail loudly rather than publish with surprise defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, Box<dyn Error>> {
        let Some(path) = path else {
            info!("No config file given; using built-in defaults");
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)?;
        let config: RunConfig = serde_yaml::from_str(&raw)?;
        if config.topics.is_empty() {
            return Err(format!("config {} has an empty topic table", path.display()).into());
        }
        info!(path = %path.display(), topics = config.topics.len(), "Loaded configuration");
        Ok(config)
    }

    /// Sum of per-topic final-selection targets.
    pub fn target_sum(&self) -> usize {
        self.topics.iter().map(|t| t.target).sum()
    }
}

fn default_topics() -> Vec<Topic> {
    let table = [
        (
            "gaming",
            3,
            "new game updates/releases or similar (patches, betas, launches)",
        ),
        (
            "hardware",
            5,
            "PC hardware or similar (GPUs, controllers, keyboards, builds)",
        ),
        (
            "world",
            5,
            "major world events (wars, global crises; focus on factual updates and impacts)",
        ),
        ("ukgov", 4, "UK government actions"),
        (
            "science",
            3,
            "new inventions and scientific discoveries or advancements",
        ),
    ];
    table
        .into_iter()
        .map(|(name, target, description)| Topic {
            name: name.to_string(),
            target,
            description: description.to_string(),
        })
        .collect()
}
