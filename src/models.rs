use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A repository eligible for scanning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoInfo {
    pub name: String,
    pub archived: bool,
    pub has_issues: bool,
}

/// Snapshot of one open issue at scan time
#[derive(Debug, Clone, Serialize)]
pub struct IssueSnapshot {
    pub number: u64,
    pub title: String,
    /// Label names, normalized to plain strings at the enumerator boundary
    pub labels: Vec<String>,
    pub updated_at: DateTime<Utc>,
    pub html_url: String,
}

/// What to do with an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Close,
    Keep,
    Skip,
}

/// Why the classifier decided what it decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Reason {
    Protected,
    Labeled,
    BotCleanup,
    Resolved,
    Stale,
    Active,
}

impl Action {
    pub fn code(&self) -> &'static str {
        match self {
            Action::Close => "close",
            Action::Keep => "keep",
            Action::Skip => "skip",
        }
    }
}

impl Reason {
    /// Machine-readable reason code, matching the JSON wire form
    pub fn code(&self) -> &'static str {
        match self {
            Reason::Protected => "protected",
            Reason::Labeled => "labeled",
            Reason::BotCleanup => "botCleanup",
            Reason::Resolved => "resolved",
            Reason::Stale => "stale",
            Reason::Active => "active",
        }
    }
}

/// Classifier output for a single issue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub action: Action,
    pub reason: Reason,
    /// Close-comment body for close decisions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Decision {
    pub fn close(reason: Reason, message: impl Into<String>) -> Self {
        Self {
            action: Action::Close,
            reason,
            message: Some(message.into()),
        }
    }

    pub fn skip(reason: Reason) -> Self {
        Self {
            action: Action::Skip,
            reason,
            message: None,
        }
    }

    pub fn keep(reason: Reason) -> Self {
        Self {
            action: Action::Keep,
            reason,
            message: None,
        }
    }
}

/// One classified issue within a run
#[derive(Debug, Clone, Serialize)]
pub struct ScanRecord {
    pub org: String,
    pub repo: String,
    pub number: u64,
    pub title: String,
    pub url: String,
    pub decision: Decision,
}

/// Aggregate counters for a single run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub scanned: u64,
    pub protected: u64,
    pub labeled: u64,
    pub bot_cleanup: u64,
    pub resolved: u64,
    pub stale: u64,
    pub closed: u64,
    pub failed: u64,
}

impl RunStats {
    /// Bump the per-reason counter for a classified issue. `scanned` and
    /// `closed` are tracked separately by the orchestrator.
    pub fn record(&mut self, decision: &Decision) {
        match decision.reason {
            Reason::Protected => self.protected += 1,
            Reason::Labeled => self.labeled += 1,
            Reason::BotCleanup => self.bot_cleanup += 1,
            Reason::Resolved => self.resolved += 1,
            Reason::Stale => self.stale += 1,
            Reason::Active => {}
        }
    }

    /// Issues matching a close rule, whether or not a close was executed
    pub fn would_close(&self) -> u64 {
        self.labeled + self.bot_cleanup + self.resolved + self.stale
    }
}

/// Everything a single scan invocation produced
#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub run_id: Uuid,
    pub records: Vec<ScanRecord>,
    pub stats: RunStats,
}

impl ScanOutcome {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            records: Vec::new(),
            stats: RunStats::default(),
        }
    }

    pub fn kept(&self) -> impl Iterator<Item = &ScanRecord> {
        self.records
            .iter()
            .filter(|r| r.decision.action == Action::Keep)
    }

    pub fn closable(&self) -> impl Iterator<Item = &ScanRecord> {
        self.records
            .iter()
            .filter(|r| r.decision.action == Action::Close)
    }
}

impl Default for ScanOutcome {
    fn default() -> Self {
        Self::new()
    }
}
