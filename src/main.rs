use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use issue_janitor::{
    render_report, resolve_summary, scan_summary, AppState, Config, GitHubClient,
    NotificationService, ReportFormat, Scanner,
};

#[derive(Parser)]
#[command(name = "issue-janitor")]
#[command(about = "Automated issue triage and cleanup for GitHub organizations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file
    #[arg(long, default_value = "janitor.yml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan all organizations and report issues that would be resolved
    Scan {
        /// Scan a single organization
        #[arg(short, long)]
        org: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve issues (close stale, duplicate, bot-generated)
    Resolve {
        /// Resolve in a single organization
        #[arg(short, long)]
        org: Option<String>,

        /// Preview without making changes
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate a detailed report of all open issues
    Report {
        /// Report for a single organization
        #[arg(short, long)]
        org: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: ReportFormat,
    },

    /// Run the scheduled service: recurring runs plus an HTTP trigger
    Serve {
        #[arg(long, default_value_t = 8080, env = "PORT")]
        port: u16,

        /// Hours between scheduled runs
        #[arg(long, default_value_t = 6, env = "RUN_INTERVAL_HOURS")]
        interval_hours: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("issue_janitor=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    config.apply_env_overrides();

    match cli.command {
        Commands::Scan { org, json } => {
            run_scan(&config, org, json).await?;
        }
        Commands::Resolve { org, dry_run } => {
            run_resolve(&config, org, dry_run).await?;
        }
        Commands::Report { org, format } => {
            run_report(&config, org, format).await?;
        }
        Commands::Serve {
            port,
            interval_hours,
        } => {
            run_serve(&config, port, interval_hours).await?;
        }
    }

    Ok(())
}

/// The access credential is required before any network call is made
fn github_token() -> Result<String> {
    std::env::var("GITHUB_TOKEN")
        .or_else(|_| std::env::var("GH_TOKEN"))
        .context("GITHUB_TOKEN or GH_TOKEN environment variable required")
}

fn target_orgs(config: &Config, org: Option<String>) -> Result<Vec<String>> {
    let orgs = match org {
        Some(org) => vec![org],
        None => config.organizations.clone(),
    };
    if orgs.is_empty() {
        anyhow::bail!(
            "No organizations configured; set `organizations` in the config file or pass --org"
        );
    }
    Ok(orgs)
}

fn build_scanner(config: &Config) -> Result<Scanner<GitHubClient>> {
    let token = github_token()?;
    let client = GitHubClient::new(&token)?;
    let rules = config.rules.compile()?;
    Ok(Scanner::new(client, rules))
}

async fn run_scan(config: &Config, org: Option<String>, json: bool) -> Result<()> {
    let orgs = target_orgs(config, org)?;
    let scanner = build_scanner(config)?;

    if !json {
        println!("Scanning {} organization(s)...", orgs.len());
    }

    let outcome = scanner.scan(&orgs, true).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    print!("{}", scan_summary(&outcome));

    Ok(())
}

async fn run_resolve(config: &Config, org: Option<String>, dry_run: bool) -> Result<()> {
    let orgs = target_orgs(config, org)?;
    let scanner = build_scanner(config)?;

    println!(
        "{}Resolving issues in {} organization(s)...",
        if dry_run { "[DRY RUN] " } else { "" },
        orgs.len()
    );

    let outcome = scanner.scan(&orgs, dry_run).await;

    print!("{}", resolve_summary(&outcome, dry_run));

    let notifier = NotificationService::new(&config.notifications.slack);
    if let Err(err) = notifier.notify_run_complete(&outcome, dry_run).await {
        warn!(error = %err, "Run notification failed");
    }

    Ok(())
}

async fn run_report(config: &Config, org: Option<String>, format: ReportFormat) -> Result<()> {
    let orgs = target_orgs(config, org)?;
    let scanner = build_scanner(config)?;

    if format == ReportFormat::Table {
        println!("Generating report for {} organization(s)...", orgs.len());
    }

    let outcome = scanner.scan(&orgs, true).await;

    println!("{}", render_report(&outcome, format)?);

    Ok(())
}

async fn run_serve(config: &Config, port: u16, interval_hours: u64) -> Result<()> {
    let orgs = target_orgs(config, None)?;
    let scanner = build_scanner(config)?;
    let notifier = NotificationService::new(&config.notifications.slack);

    let state = AppState::new(scanner, notifier, orgs);

    issue_janitor::serve(state, port, interval_hours).await
}
