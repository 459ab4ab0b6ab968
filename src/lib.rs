pub mod classifier;
pub mod config;
pub mod github;
pub mod models;
pub mod notifications;
pub mod orchestrator;
pub mod report;
pub mod server;

pub use classifier::classify;
pub use config::{Config, RuleSet};
pub use github::{ApiError, CloseOutcome, GitHubClient, IssueHost, RetryPolicy};
pub use models::*;
pub use notifications::NotificationService;
pub use orchestrator::Scanner;
pub use report::{render_report, resolve_summary, scan_summary, ReportFormat};
pub use server::{build_router, serve, AppState};
