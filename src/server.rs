use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::{info, warn};

use crate::github::GitHubClient;
use crate::notifications::NotificationService;
use crate::orchestrator::Scanner;

/// Shared state passed to all route handlers
#[derive(Clone)]
pub struct AppState {
    inner: Arc<ServiceContext>,
}

struct ServiceContext {
    scanner: Scanner<GitHubClient>,
    notifier: NotificationService,
    organizations: Vec<String>,
}

impl AppState {
    pub fn new(
        scanner: Scanner<GitHubClient>,
        notifier: NotificationService,
        organizations: Vec<String>,
    ) -> Self {
        Self {
            inner: Arc::new(ServiceContext {
                scanner,
                notifier,
                organizations,
            }),
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    orgs: Vec<String>,
    stale_days: i64,
}

#[derive(Serialize)]
struct TriggerResponse {
    status: &'static str,
}

/// Build the axum Router with all routes. Separated from `serve()` so
/// handlers can be exercised in tests.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/run", post(trigger_run))
        .fallback(usage)
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        orgs: state.inner.organizations.clone(),
        stale_days: state.inner.scanner.rules().stale_threshold_days,
    })
}

async fn trigger_run(State(state): State<AppState>) -> Json<TriggerResponse> {
    info!("Manual run triggered");
    tokio::spawn(run_once(state.clone()));
    Json(TriggerResponse {
        status: "triggered",
    })
}

async fn usage() -> &'static str {
    "issue-janitor - GET /health or POST /run"
}

/// One full scan-and-resolve pass over the configured organizations
async fn run_once(state: AppState) {
    let ctx = &state.inner;
    let outcome = ctx.scanner.scan(&ctx.organizations, false).await;

    if let Err(err) = ctx.notifier.notify_run_complete(&outcome, false).await {
        warn!(error = %err, "Run notification failed");
    }
}

/// Start the service: recurring scheduled runs plus the HTTP trigger and
/// health endpoints.
pub async fn serve(state: AppState, port: u16, interval_hours: u64) -> Result<()> {
    let scheduler_state = state.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_hours * 3600));
        // The first tick fires immediately; consume it so boot does not
        // trigger a run.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            info!(interval_hours, "Scheduled run starting");
            run_once(scheduler_state.clone()).await;
        }
    });

    let app = build_router(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("issue-janitor service listening on http://localhost:{port}");

    axum::serve(listener, app).await?;
    Ok(())
}
