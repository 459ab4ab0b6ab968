use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::classifier::classify;
use crate::config::RuleSet;
use crate::github::{ApiError, CloseOutcome, IssueHost};
use crate::models::{Action, Decision, IssueSnapshot, RunStats, ScanOutcome, ScanRecord};

/// Drives the organization → repository → issue traversal, classifying
/// every open issue and executing close decisions.
///
/// Generic over [`IssueHost`] so tests can substitute an in-memory host.
pub struct Scanner<H: IssueHost> {
    host: H,
    rules: RuleSet,
}

enum ScanFlow {
    Continue,
    CapReached,
}

impl<H: IssueHost> Scanner<H> {
    pub fn new(host: H, rules: RuleSet) -> Self {
        Self { host, rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Scan every organization sequentially and return the full outcome.
    ///
    /// A failure inside one organization is logged and does not abort the
    /// others. The run stops early once the run-wide issue cap is reached;
    /// whatever was gathered so far is returned.
    pub async fn scan(&self, orgs: &[String], dry_run: bool) -> ScanOutcome {
        let mut outcome = ScanOutcome::new();

        info!(
            run_id = %outcome.run_id,
            orgs = orgs.len(),
            dry_run,
            "Starting scan"
        );

        for org in orgs {
            match self.scan_org(org, dry_run, &mut outcome).await {
                Ok(ScanFlow::Continue) => {}
                Ok(ScanFlow::CapReached) => {
                    info!(
                        run_id = %outcome.run_id,
                        cap = self.rules.max_issues_per_run,
                        "Issue cap reached, stopping run"
                    );
                    break;
                }
                Err(err) => {
                    error!(org = %org, error = %err, "Organization scan failed, moving on");
                }
            }
        }

        info!(
            run_id = %outcome.run_id,
            scanned = outcome.stats.scanned,
            closed = outcome.stats.closed,
            failed = outcome.stats.failed,
            "Scan complete"
        );

        outcome
    }

    async fn scan_org(
        &self,
        org: &str,
        dry_run: bool,
        outcome: &mut ScanOutcome,
    ) -> Result<ScanFlow, ApiError> {
        let repos = self.host.list_repositories(org).await?;

        info!(org, repos = repos.len(), "Scanning organization");

        for repo in repos {
            let issues = match self.host.list_open_issues(org, &repo.name).await {
                Ok(issues) => issues,
                Err(err) => {
                    warn!(
                        org,
                        repo = %repo.name,
                        error = %err,
                        "Issue listing failed, skipping repository"
                    );
                    continue;
                }
            };

            for issue in issues {
                outcome.stats.scanned += 1;

                let decision = classify(&issue, &self.rules, Utc::now());
                outcome.stats.record(&decision);

                if decision.action == Action::Close && !dry_run {
                    self.execute_close(org, &repo.name, &issue, &decision, &mut outcome.stats)
                        .await;
                }

                outcome.records.push(ScanRecord {
                    org: org.to_string(),
                    repo: repo.name.clone(),
                    number: issue.number,
                    title: issue.title,
                    url: issue.html_url,
                    decision,
                });

                if outcome.stats.scanned >= self.rules.max_issues_per_run as u64 {
                    return Ok(ScanFlow::CapReached);
                }
            }
        }

        Ok(ScanFlow::Continue)
    }

    async fn execute_close(
        &self,
        org: &str,
        repo: &str,
        issue: &IssueSnapshot,
        decision: &Decision,
        stats: &mut RunStats,
    ) {
        let message = decision.message.as_deref().unwrap_or_default();

        match self
            .host
            .close_issue(org, repo, issue.number, message, false)
            .await
        {
            Ok(CloseOutcome::Closed) => {
                stats.closed += 1;
                info!(org, repo, number = issue.number, reason = ?decision.reason, "Closed issue");
            }
            Ok(CloseOutcome::AlreadyGone) => {
                debug!(org, repo, number = issue.number, "Issue was already resolved");
            }
            Ok(CloseOutcome::DryRun) => {}
            Err(err) => {
                stats.failed += 1;
                warn!(
                    org,
                    repo,
                    number = issue.number,
                    error = %err,
                    "Failed to close issue, continuing"
                );
            }
        }
    }
}
