use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Organizations scanned when no `--org` override is given
    pub organizations: Vec<String>,
    pub rules: RulesConfig,
    pub notifications: NotificationsConfig,
}

/// Issue triage policy as written in the config file. Compiled into a
/// [`RuleSet`] before a run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Close issues with no activity for more than this many days
    pub stale_threshold_days: i64,
    /// Labels that trigger closure
    pub auto_close_labels: Vec<String>,
    /// Labels that prevent closure regardless of other rules
    pub protected_labels: Vec<String>,
    /// Title keywords that indicate an already-resolved issue
    pub resolved_keywords: Vec<String>,
    /// Title regexes that identify bot-generated issues
    pub bot_title_patterns: Vec<String>,
    /// Hard cap on issues examined in a single run
    pub max_issues_per_run: usize,
    pub messages: Messages,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            stale_threshold_days: 90,
            auto_close_labels: vec![
                "wontfix".to_string(),
                "duplicate".to_string(),
                "invalid".to_string(),
                "stale".to_string(),
            ],
            protected_labels: vec![
                "critical".to_string(),
                "security".to_string(),
                "in-progress".to_string(),
                "help-wanted".to_string(),
                "bug".to_string(),
            ],
            resolved_keywords: vec![
                "completed".to_string(),
                "done".to_string(),
                "fixed".to_string(),
                "resolved".to_string(),
                "shipped".to_string(),
            ],
            bot_title_patterns: vec![
                r"^\[P\d\]".to_string(),
                r"^_.*_$".to_string(),
                r"(?i)Badge.*flat".to_string(),
                r"(?i)Codex Review".to_string(),
            ],
            max_issues_per_run: 100,
            messages: Messages::default(),
        }
    }
}

/// Close-comment bodies, one per close reason
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub stale: String,
    pub duplicate: String,
    pub resolved: String,
    pub bot_cleanup: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            stale: "This issue has been automatically closed due to inactivity. \
                    If this is still relevant, please reopen with updated information."
                .to_string(),
            duplicate: "Closing as duplicate. Please refer to the linked issue for updates."
                .to_string(),
            resolved: "This issue appears to have been resolved. Closing automatically."
                .to_string(),
            bot_cleanup: "Closing automated/bot-generated issue as part of repository cleanup."
                .to_string(),
        }
    }
}

/// Notifications configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NotificationsConfig {
    pub slack: SlackConfig,
}

/// Slack notification configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SlackConfig {
    pub enabled: bool,
    pub webhook_url: Option<String>,
    pub channel: Option<String>,
}

/// Compiled triage policy: lowercased label/keyword sets and compiled
/// title regexes. Immutable for the duration of a run.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub stale_threshold_days: i64,
    pub auto_close_labels: Vec<String>,
    pub protected_labels: Vec<String>,
    pub resolved_keywords: Vec<String>,
    pub bot_title_patterns: Vec<Regex>,
    pub max_issues_per_run: usize,
    pub messages: Messages,
}

impl RulesConfig {
    /// Compile the raw config into a run-ready rule set. Fails if any bot
    /// title pattern is not a valid regex.
    pub fn compile(&self) -> Result<RuleSet> {
        let bot_title_patterns = self
            .bot_title_patterns
            .iter()
            .map(|p| {
                Regex::new(p).with_context(|| format!("Invalid bot title pattern: {}", p))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RuleSet {
            stale_threshold_days: self.stale_threshold_days,
            auto_close_labels: lowercased(&self.auto_close_labels),
            protected_labels: lowercased(&self.protected_labels),
            resolved_keywords: lowercased(&self.resolved_keywords),
            bot_title_patterns,
            max_issues_per_run: self.max_issues_per_run,
            messages: self.messages.clone(),
        })
    }
}

fn lowercased(items: &[String]) -> Vec<String> {
    items.iter().map(|s| s.to_lowercase()).collect()
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!(path = %path.display(), "Loaded configuration");

        Ok(config)
    }

    /// Apply `ORGS` and `STALE_DAYS` environment overrides. Used by the
    /// service deployment, where configuration arrives through env vars.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var("ORGS").ok(),
            std::env::var("STALE_DAYS").ok(),
        );
    }

    fn apply_overrides(&mut self, orgs: Option<String>, stale_days: Option<String>) {
        if let Some(orgs) = orgs {
            self.organizations = orgs
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }

        if let Some(days) = stale_days {
            match days.parse::<i64>() {
                Ok(n) => self.rules.stale_threshold_days = n,
                Err(_) => warn!(value = %days, "Ignoring unparsable STALE_DAYS override"),
            }
        }
    }
}
