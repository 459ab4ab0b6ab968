pub mod client;

pub use client::GitHubClient;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{IssueSnapshot, RepoInfo};

/// Error from the issue-hosting service.
///
/// 404 is split out because an already-closed or deleted issue is a benign
/// no-op for this tool, never a failure.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("resource not found")]
    NotFound,

    #[error("GitHub API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error(transparent)]
    Transport(octocrab::Error),
}

impl ApiError {
    /// Rate limiting and server-side failures are worth another attempt;
    /// everything else fails fast.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Api { status, .. } if *status == 429 || *status >= 500)
    }
}

pub(crate) fn map_octocrab(err: octocrab::Error) -> ApiError {
    match err {
        octocrab::Error::GitHub { source, .. } => {
            let status = source.status_code.as_u16();
            if status == 404 {
                ApiError::NotFound
            } else {
                ApiError::Api {
                    status,
                    message: source.message,
                }
            }
        }
        other => ApiError::Transport(other),
    }
}

/// Result of one close attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Comment posted and issue transitioned to closed
    Closed,
    /// The issue was already closed or deleted (404 from the service)
    AlreadyGone,
    /// Dry run, nothing was sent
    DryRun,
}

/// Bounded exponential backoff applied to retryable API failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following failed attempt `attempt` (1-based):
    /// base, 2×base, 4×base, ...
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// The hosting-service operations the scan orchestrator needs. Implemented
/// by [`GitHubClient`] for production and by in-memory fakes in tests.
#[async_trait]
pub trait IssueHost: Send + Sync {
    /// List an organization's repositories, excluding archived ones and
    /// those with issue tracking disabled.
    async fn list_repositories(&self, org: &str) -> Result<Vec<RepoInfo>, ApiError>;

    /// List a repository's open issues, excluding pull requests.
    async fn list_open_issues(&self, org: &str, repo: &str)
        -> Result<Vec<IssueSnapshot>, ApiError>;

    /// Post an explanatory comment, then close the issue as "not planned".
    /// Under `dry_run` this performs no network interaction at all.
    async fn close_issue(
        &self,
        org: &str,
        repo: &str,
        number: u64,
        message: &str,
        dry_run: bool,
    ) -> Result<CloseOutcome, ApiError>;
}
