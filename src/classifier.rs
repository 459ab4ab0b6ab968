use chrono::{DateTime, Utc};

use crate::config::RuleSet;
use crate::models::{Decision, IssueSnapshot, Reason};

/// Classify a single issue against the triage policy.
///
/// Rules are evaluated in fixed precedence order and the first match wins:
/// protected labels, auto-close labels, bot title patterns, resolved
/// keywords, staleness. Anything else is kept as active. Pure function of
/// its inputs; the caller supplies `now` so runs are reproducible.
pub fn classify(issue: &IssueSnapshot, rules: &RuleSet, now: DateTime<Utc>) -> Decision {
    let labels: Vec<String> = issue.labels.iter().map(|l| l.to_lowercase()).collect();

    if labels.iter().any(|l| rules.protected_labels.contains(l)) {
        return Decision::skip(Reason::Protected);
    }

    if labels.iter().any(|l| rules.auto_close_labels.contains(l)) {
        return Decision::close(Reason::Labeled, rules.messages.duplicate.clone());
    }

    if rules
        .bot_title_patterns
        .iter()
        .any(|p| p.is_match(&issue.title))
    {
        return Decision::close(Reason::BotCleanup, rules.messages.bot_cleanup.clone());
    }

    let title = issue.title.to_lowercase();
    if rules.resolved_keywords.iter().any(|kw| title.contains(kw)) {
        return Decision::close(Reason::Resolved, rules.messages.resolved.clone());
    }

    // Whole elapsed days, truncated toward zero. An issue updated exactly
    // `stale_threshold_days` ago is not yet stale.
    let days_since_update = (now - issue.updated_at).num_days();
    if days_since_update > rules.stale_threshold_days {
        return Decision::close(Reason::Stale, rules.messages.stale.clone());
    }

    Decision::keep(Reason::Active)
}
