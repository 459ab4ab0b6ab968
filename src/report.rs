use std::fmt::Write as _;

use anyhow::Result;
use clap::ValueEnum;

use crate::models::{ScanOutcome, ScanRecord};

/// Output format for the `report` command
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Table,
    Json,
    Markdown,
}

/// Render all scan records in the requested format
pub fn render_report(outcome: &ScanOutcome, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Table => Ok(render_table(&outcome.records)),
        ReportFormat::Json => Ok(serde_json::to_string_pretty(&outcome.records)?),
        ReportFormat::Markdown => Ok(render_markdown(&outcome.records)),
    }
}

fn render_table(records: &[ScanRecord]) -> String {
    let mut out = String::new();
    for r in records {
        let _ = writeln!(
            out,
            "{}/{}#{} - {} ({})",
            r.org,
            r.repo,
            r.number,
            r.decision.action.code().to_uppercase(),
            r.decision.reason.code()
        );
    }
    out
}

fn render_markdown(records: &[ScanRecord]) -> String {
    let mut md = String::new();
    md.push_str("# Issue Resolution Report\n\n");

    // Group by organization, preserving scan order
    let mut by_org: Vec<(&str, Vec<&ScanRecord>)> = Vec::new();
    for r in records {
        match by_org.iter_mut().find(|(org, _)| *org == r.org) {
            Some((_, group)) => group.push(r),
            None => by_org.push((&r.org, vec![r])),
        }
    }

    for (org, group) in by_org {
        let _ = writeln!(md, "## {org}\n");
        md.push_str("| Repo | Issue | Title | Action |\n");
        md.push_str("|------|-------|-------|--------|\n");
        for r in group {
            let _ = writeln!(
                md,
                "| {} | #{} | {} | {} ({}) |",
                r.repo,
                r.number,
                truncate(&r.title, 40),
                r.decision.action.code(),
                r.decision.reason.code()
            );
        }
        md.push('\n');
    }

    md
}

/// Human summary printed after a `scan` run
pub fn scan_summary(outcome: &ScanOutcome) -> String {
    let stats = &outcome.stats;
    let mut out = String::new();

    out.push_str("\n=== Scan Results ===\n");
    let _ = writeln!(out, "Total scanned: {}", stats.scanned);
    let _ = writeln!(out, "Would close: {}", stats.would_close());
    let _ = writeln!(out, "  - Stale: {}", stats.stale);
    let _ = writeln!(out, "  - Bot/Automated: {}", stats.bot_cleanup);
    let _ = writeln!(out, "  - Resolved: {}", stats.resolved);
    let _ = writeln!(out, "  - Labeled for closure: {}", stats.labeled);
    let _ = writeln!(out, "Protected (skipped): {}", stats.protected);
    let _ = writeln!(out, "Keeping open: {}", outcome.kept().count());

    let closable: Vec<_> = outcome.closable().collect();
    if !closable.is_empty() {
        out.push_str("\n=== Issues to Close ===\n");
        for r in &closable {
            let _ = writeln!(
                out,
                "  {}/{}#{}: {} ({})",
                r.org,
                r.repo,
                r.number,
                truncate(&r.title, 50),
                r.decision.reason.code()
            );
        }
    }

    out.push_str("\nRun 'issue-janitor resolve' to close these issues.\n");
    out
}

/// Human summary printed after a `resolve` run
pub fn resolve_summary(outcome: &ScanOutcome, dry_run: bool) -> String {
    let stats = &outcome.stats;
    let mut out = String::new();

    if dry_run {
        out.push_str("\n=== Resolution Preview (dry run) ===\n");
    } else {
        out.push_str("\n=== Resolution Complete ===\n");
    }
    let _ = writeln!(out, "Scanned: {}", stats.scanned);
    let _ = writeln!(out, "Closed: {}", stats.closed);
    let _ = writeln!(out, "  - Stale: {}", stats.stale);
    let _ = writeln!(out, "  - Bot/Automated: {}", stats.bot_cleanup);
    let _ = writeln!(out, "  - Resolved: {}", stats.resolved);
    let _ = writeln!(out, "  - Labeled for closure: {}", stats.labeled);
    let _ = writeln!(out, "Protected (skipped): {}", stats.protected);
    if stats.failed > 0 {
        let _ = writeln!(out, "Failed: {}", stats.failed);
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut t: String = s.chars().take(max).collect();
        t.push_str("...");
        t
    }
}
