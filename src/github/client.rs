use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::future::Future;
use tracing::{debug, info, warn};

use super::{map_octocrab, ApiError, CloseOutcome, IssueHost, RetryPolicy};
use crate::models::{IssueSnapshot, RepoInfo};

const PAGE_SIZE: u32 = 100;

/// GitHub API client for repository and issue traversal
pub struct GitHubClient {
    client: Octocrab,
    retry: RetryPolicy,
}

impl GitHubClient {
    /// Create a new GitHub client with the given token
    pub fn new(token: &str) -> Result<Self> {
        let client = Octocrab::builder()
            .personal_token(token.to_string())
            .build()
            .context("Failed to create GitHub client")?;

        Ok(Self {
            client,
            retry: RetryPolicy::default(),
        })
    }

    /// Create a client against a non-default API endpoint (test servers,
    /// GitHub Enterprise)
    pub fn with_base_uri(token: &str, base_uri: &str) -> Result<Self> {
        let client = Octocrab::builder()
            .base_uri(base_uri)
            .context("Invalid GitHub base URI")?
            .personal_token(token.to_string())
            .build()
            .context("Failed to create GitHub client")?;

        Ok(Self {
            client,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn get_json<T: DeserializeOwned>(&self, route: &str) -> Result<T, ApiError> {
        self.client
            .get(route, None::<&()>)
            .await
            .map_err(map_octocrab)
    }

    async fn post_json(&self, route: &str, body: &serde_json::Value) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .client
            .post(route, Some(body))
            .await
            .map_err(map_octocrab)?;
        Ok(())
    }

    async fn patch_json(&self, route: &str, body: &serde_json::Value) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .client
            .patch(route, Some(body))
            .await
            .map_err(map_octocrab)?;
        Ok(())
    }

    /// Run `op`, retrying rate-limit and server-side failures with bounded
    /// exponential backoff. Non-retryable errors surface immediately.
    async fn with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        what,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying GitHub request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Repository fields we care about, straight off the wire
#[derive(Debug, Deserialize)]
struct RepoRecord {
    name: String,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    has_issues: bool,
}

/// Issue fields we care about. `pull_request` is the marker GitHub sets on
/// issue records that are actually pull requests.
#[derive(Debug, Deserialize)]
struct IssueRecord {
    number: u64,
    title: String,
    #[serde(default)]
    labels: Vec<LabelField>,
    updated_at: DateTime<Utc>,
    html_url: String,
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

/// Labels arrive either as bare strings or structured records
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LabelField {
    Name(String),
    Structured { name: String },
}

impl LabelField {
    fn into_name(self) -> String {
        match self {
            LabelField::Name(name) => name,
            LabelField::Structured { name } => name,
        }
    }
}

#[async_trait::async_trait]
impl IssueHost for GitHubClient {
    async fn list_repositories(&self, org: &str) -> Result<Vec<RepoInfo>, ApiError> {
        let mut repos = Vec::new();
        let mut page = 1u32;

        loop {
            let route = format!("/orgs/{org}/repos?type=all&per_page={PAGE_SIZE}&page={page}");
            let batch: Vec<RepoRecord> = self
                .with_retry("list repositories", || self.get_json(&route))
                .await?;

            if batch.is_empty() {
                break;
            }

            repos.extend(
                batch
                    .into_iter()
                    .filter(|r| !r.archived && r.has_issues)
                    .map(|r| RepoInfo {
                        name: r.name,
                        archived: r.archived,
                        has_issues: r.has_issues,
                    }),
            );
            page += 1;
        }

        debug!(org, count = repos.len(), "Listed repositories");

        Ok(repos)
    }

    async fn list_open_issues(
        &self,
        org: &str,
        repo: &str,
    ) -> Result<Vec<IssueSnapshot>, ApiError> {
        let mut issues = Vec::new();
        let mut page = 1u32;

        loop {
            let route = format!(
                "/repos/{org}/{repo}/issues?state=open&per_page={PAGE_SIZE}&page={page}"
            );
            let batch: Vec<IssueRecord> = self
                .with_retry("list open issues", || self.get_json(&route))
                .await?;

            if batch.is_empty() {
                break;
            }

            issues.extend(
                batch
                    .into_iter()
                    .filter(|i| i.pull_request.is_none())
                    .map(|i| IssueSnapshot {
                        number: i.number,
                        title: i.title,
                        labels: i.labels.into_iter().map(LabelField::into_name).collect(),
                        updated_at: i.updated_at,
                        html_url: i.html_url,
                    }),
            );
            page += 1;
        }

        debug!(org, repo, count = issues.len(), "Listed open issues");

        Ok(issues)
    }

    async fn close_issue(
        &self,
        org: &str,
        repo: &str,
        number: u64,
        message: &str,
        dry_run: bool,
    ) -> Result<CloseOutcome, ApiError> {
        if dry_run {
            debug!(org, repo, number, "Dry run, not closing");
            return Ok(CloseOutcome::DryRun);
        }

        info!(org, repo, number, "Closing issue");

        let comment_route = format!("/repos/{org}/{repo}/issues/{number}/comments");
        let comment = serde_json::json!({ "body": message });
        match self
            .with_retry("post close comment", || {
                self.post_json(&comment_route, &comment)
            })
            .await
        {
            Ok(()) => {}
            Err(ApiError::NotFound) => {
                debug!(org, repo, number, "Issue already closed or deleted");
                return Ok(CloseOutcome::AlreadyGone);
            }
            Err(err) => return Err(err),
        }

        let close_route = format!("/repos/{org}/{repo}/issues/{number}");
        let close = serde_json::json!({ "state": "closed", "state_reason": "not_planned" });
        match self
            .with_retry("close issue", || self.patch_json(&close_route, &close))
            .await
        {
            Ok(()) => Ok(CloseOutcome::Closed),
            Err(ApiError::NotFound) => Ok(CloseOutcome::AlreadyGone),
            // The comment landed but the state change did not; the issue
            // stays open with an explanatory comment and the caller decides
            // whether to count it as a failure.
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    async fn client(server: &MockServer) -> GitHubClient {
        GitHubClient::with_base_uri("test-token", &server.uri())
            .unwrap()
            .with_retry_policy(fast_retry())
    }

    fn repo_page(count: usize, offset: usize) -> serde_json::Value {
        (0..count)
            .map(|i| {
                json!({
                    "name": format!("repo-{}", offset + i),
                    "archived": false,
                    "has_issues": true
                })
            })
            .collect()
    }

    fn issue(number: u64, title: &str) -> serde_json::Value {
        json!({
            "number": number,
            "title": title,
            "labels": [],
            "updated_at": "2024-01-15T10:30:00Z",
            "html_url": format!("https://github.com/acme/widgets/issues/{number}")
        })
    }

    #[tokio::test]
    async fn test_repo_pagination_stops_on_empty_page() {
        let server = MockServer::start().await;

        for (page, count, offset) in [("1", 100, 0), ("2", 100, 100), ("3", 50, 200)] {
            Mock::given(method("GET"))
                .and(path("/orgs/acme/repos"))
                .and(query_param("page", page))
                .respond_with(ResponseTemplate::new(200).set_body_json(repo_page(count, offset)))
                .expect(1)
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .and(query_param("page", "4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let repos = client(&server).await.list_repositories("acme").await.unwrap();

        // 250 items at page size 100: three full-or-partial pages plus the
        // empty terminator, four requests total
        assert_eq!(repos.len(), 250);
        assert_eq!(repos[0].name, "repo-0");
        assert_eq!(repos[249].name, "repo-249");
    }

    #[tokio::test]
    async fn test_repo_pagination_exact_multiple() {
        let server = MockServer::start().await;

        for (page, count, offset) in [("1", 100, 0), ("2", 100, 100)] {
            Mock::given(method("GET"))
                .and(path("/orgs/acme/repos"))
                .and(query_param("page", page))
                .respond_with(ResponseTemplate::new(200).set_body_json(repo_page(count, offset)))
                .expect(1)
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .and(query_param("page", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        // 200 items: two pages of data plus the empty page, three requests
        let repos = client(&server).await.list_repositories("acme").await.unwrap();
        assert_eq!(repos.len(), 200);
    }

    #[tokio::test]
    async fn test_repos_filtered_to_scannable() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "name": "active", "archived": false, "has_issues": true },
                { "name": "attic", "archived": true, "has_issues": true },
                { "name": "mirror", "archived": false, "has_issues": false }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let repos = client(&server).await.list_repositories("acme").await.unwrap();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].name, "active");
    }

    #[tokio::test]
    async fn test_issues_exclude_pull_requests_and_normalize_labels() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/issues"))
            .and(query_param("state", "open"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "number": 1,
                    "title": "Broken build",
                    "labels": [ { "name": "Bug", "color": "d73a4a" }, "ci" ],
                    "updated_at": "2024-01-15T10:30:00Z",
                    "html_url": "https://github.com/acme/widgets/issues/1"
                },
                {
                    "number": 2,
                    "title": "Add feature",
                    "labels": [],
                    "updated_at": "2024-01-15T10:30:00Z",
                    "html_url": "https://github.com/acme/widgets/pull/2",
                    "pull_request": { "url": "https://api.github.com/repos/acme/widgets/pulls/2" }
                }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/issues"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let issues = client(&server)
            .await
            .list_open_issues("acme", "widgets")
            .await
            .unwrap();

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].number, 1);
        assert_eq!(issues[0].labels, vec!["Bug", "ci"]);
    }

    #[tokio::test]
    async fn test_close_issue_comments_then_closes() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/repos/acme/widgets/issues/7/comments"))
            .and(body_partial_json(json!({ "body": "Closing as stale." })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 1 })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/repos/acme/widgets/issues/7"))
            .and(body_partial_json(
                json!({ "state": "closed", "state_reason": "not_planned" }),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "number": 7 })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client(&server)
            .await
            .close_issue("acme", "widgets", 7, "Closing as stale.", false)
            .await
            .unwrap();

        assert_eq!(outcome, CloseOutcome::Closed);
    }

    #[tokio::test]
    async fn test_close_issue_dry_run_sends_nothing() {
        let server = MockServer::start().await;

        let outcome = client(&server)
            .await
            .close_issue("acme", "widgets", 7, "msg", true)
            .await
            .unwrap();

        assert_eq!(outcome, CloseOutcome::DryRun);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_close_issue_404_is_benign() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/repos/acme/widgets/issues/7/comments"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "message": "Not Found",
                "documentation_url": "https://docs.github.com/rest"
            })))
            .mount(&server)
            .await;

        let outcome = client(&server)
            .await
            .close_issue("acme", "widgets", 7, "msg", false)
            .await
            .unwrap();

        assert_eq!(outcome, CloseOutcome::AlreadyGone);
    }

    #[tokio::test]
    async fn test_close_issue_404_on_state_change_is_benign() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/repos/acme/widgets/issues/7/comments"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 1 })))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/repos/acme/widgets/issues/7"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "message": "Not Found",
                "documentation_url": "https://docs.github.com/rest"
            })))
            .mount(&server)
            .await;

        let outcome = client(&server)
            .await
            .close_issue("acme", "widgets", 7, "msg", false)
            .await
            .unwrap();

        assert_eq!(outcome, CloseOutcome::AlreadyGone);
    }

    #[tokio::test]
    async fn test_server_errors_retried_then_succeed() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .respond_with(ResponseTemplate::new(502).set_body_json(json!({
                "message": "bad gateway",
                "documentation_url": "https://docs.github.com/rest"
            })))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let repos = client(&server).await.list_repositories("acme").await.unwrap();
        assert!(repos.is_empty());
    }

    #[tokio::test]
    async fn test_client_errors_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "message": "forbidden",
                "documentation_url": "https://docs.github.com/rest"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server)
            .await
            .list_repositories("acme")
            .await
            .unwrap_err();

        match err {
            ApiError::Api { status, .. } => assert_eq!(status, 403),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
