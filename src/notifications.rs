use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SlackConfig;
use crate::models::ScanOutcome;

/// Notification service for run summaries
pub struct NotificationService {
    client: Client,
    slack: Option<SlackNotifier>,
}

impl NotificationService {
    pub fn new(slack_config: &SlackConfig) -> Self {
        let slack = if slack_config.enabled {
            slack_config
                .webhook_url
                .as_ref()
                .map(|url| SlackNotifier::new(url.clone(), slack_config.channel.clone()))
        } else {
            None
        };

        Self {
            client: Client::new(),
            slack,
        }
    }

    /// Send a summary of a finished run. No-op when Slack is not configured.
    pub async fn notify_run_complete(&self, outcome: &ScanOutcome, dry_run: bool) -> Result<()> {
        if let Some(ref slack) = self.slack {
            slack.notify_run_complete(&self.client, outcome, dry_run).await?;
        }
        Ok(())
    }
}

/// Slack webhook notifier
struct SlackNotifier {
    webhook_url: String,
    channel: Option<String>,
}

#[derive(Serialize)]
struct SlackMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<String>,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    blocks: Option<Vec<SlackBlock>>,
}

#[derive(Serialize)]
struct SlackBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<SlackText>,
}

#[derive(Serialize)]
struct SlackText {
    #[serde(rename = "type")]
    text_type: String,
    text: String,
}

impl SlackNotifier {
    fn new(webhook_url: String, channel: Option<String>) -> Self {
        Self {
            webhook_url,
            channel,
        }
    }

    async fn send(&self, client: &Client, message: SlackMessage) -> Result<()> {
        debug!("Sending Slack notification");

        let response = client
            .post(&self.webhook_url)
            .json(&message)
            .send()
            .await
            .context("Failed to send Slack notification")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Slack notification failed");
            anyhow::bail!("Slack webhook returned error: {} - {}", status, body);
        }

        info!("Slack notification sent");
        Ok(())
    }

    async fn notify_run_complete(
        &self,
        client: &Client,
        outcome: &ScanOutcome,
        dry_run: bool,
    ) -> Result<()> {
        let stats = &outcome.stats;
        let mode = if dry_run { " (dry run)" } else { "" };

        let text = format!(
            "🧹 Issue janitor run complete{}\n\
             Scanned {} issues, closed {} \
             (stale {}, bot {}, resolved {}, labeled {}), protected {}, failed {}",
            mode,
            stats.scanned,
            stats.closed,
            stats.stale,
            stats.bot_cleanup,
            stats.resolved,
            stats.labeled,
            stats.protected,
            stats.failed
        );

        let message = SlackMessage {
            channel: self.channel.clone(),
            text: text.clone(),
            blocks: Some(vec![
                SlackBlock {
                    block_type: "section".to_string(),
                    text: Some(SlackText {
                        text_type: "mrkdwn".to_string(),
                        text,
                    }),
                },
                SlackBlock {
                    block_type: "section".to_string(),
                    text: Some(SlackText {
                        text_type: "mrkdwn".to_string(),
                        text: format!("Run ID: `{}`", outcome.run_id),
                    }),
                },
            ]),
        };

        self.send(client, message).await
    }
}
