//! GitHub issue tracker
//!
//! Wraps the handful of GitHub REST API v3 calls the receiver needs. Open
//! issues are discovered through the search API, restricted to the owner and
//! to issues carrying the alert label, so issues in every repository of the
//! owner are visible.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, LINK, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::{IssueTracker, TrackedIssue};
use crate::{Error, Result};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

lazy_static! {
    static ref NEXT_LINK: Regex = Regex::new(r#"<([^>]+)>;\s*rel="next""#).expect("valid regex");
}

#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub api_url: String,
    /// User or organization that owns every repository issues are filed in.
    pub owner: String,
    pub token: String,
    /// Applied to every created issue and used to find them again.
    pub alert_label: String,
    /// Upper bound for each individual API call.
    pub timeout: Duration,
}

pub struct GitHubTracker {
    http: Client,
    api_url: Url,
    owner: String,
    token: String,
    alert_label: String,
}

// GitHub API payloads
#[derive(Debug, Deserialize)]
struct GitHubIssue {
    #[serde(default)]
    id: u64,
    #[serde(default)]
    number: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    labels: Vec<GitHubLabel>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    repository_url: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    items: Vec<GitHubIssue>,
}

#[derive(Debug, Serialize)]
struct CreateIssueRequest<'a> {
    title: &'a str,
    body: &'a str,
    labels: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct LabelsRequest<'a> {
    labels: [&'a str; 1],
}

#[derive(Debug, Serialize)]
struct StateRequest<'a> {
    state: &'a str,
}

#[derive(Debug, Serialize)]
struct ProjectCardRequest<'a> {
    content_id: u64,
    content_type: &'a str,
}

impl GitHubIssue {
    fn into_tracked(self) -> TrackedIssue {
        let repository = self
            .repository_url
            .as_deref()
            .and_then(repository_from_url)
            .unwrap_or_default();

        TrackedIssue {
            id: self.id,
            number: self.number,
            title: self.title,
            body: self.body.unwrap_or_default(),
            labels: self.labels.into_iter().map(|label| label.name).collect(),
            is_open: self.state.as_deref() != Some("closed"),
            repository,
            html_url: self.html_url.unwrap_or_default(),
        }
    }
}

/// Extracts "owner/repo" from an issue's repository URL, e.g.
/// `https://api.github.com/repos/owner/repo`. Issues returned by the search
/// API only carry partial records, so this is the only place to learn it.
fn repository_from_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [.., "repos", owner, repo] => Some(format!("{}/{}", owner, repo)),
        _ => None,
    }
}

/// Page number of the `rel="next"` link, if any.
fn next_page(headers: &HeaderMap) -> Option<u32> {
    let link = headers.get(LINK)?.to_str().ok()?;
    let next = NEXT_LINK.captures(link)?.get(1)?.as_str();
    let url = Url::parse(next).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "page")
        .and_then(|(_, value)| value.parse().ok())
}

fn split_repository(issue: &TrackedIssue) -> Result<(&str, &str)> {
    issue
        .repository
        .split_once('/')
        .filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty())
        .ok_or_else(|| {
            Error::Tracker(format!(
                "issue #{} {:?} has an invalid repository",
                issue.number, issue.title
            ))
        })
}

async fn check(resp: Response, operation: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let exhausted = resp
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|value| value.to_str().ok())
        == Some("0");
    let body = resp.text().await.unwrap_or_default();

    if exhausted && (status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS) {
        return Err(Error::RateLimited(format!("GitHub {} returned {}", operation, status)));
    }
    Err(Error::Tracker(format!(
        "GitHub {} returned {}: {}",
        operation, status, body
    )))
}

impl GitHubTracker {
    pub fn new(config: GitHubConfig) -> Result<Self> {
        let api_url = Url::parse(&config.api_url)
            .map_err(|e| Error::Config(format!("invalid GitHub API URL {:?}: {}", config.api_url, e)))?;
        if api_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "invalid GitHub API URL {:?}",
                config.api_url
            )));
        }

        let http = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http,
            api_url,
            owner: config.owner,
            token: config.token,
            alert_label: config.alert_label,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.api_url.clone();
        // Checked in new(): the API URL can be a base.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(AUTHORIZATION, format!("token {}", self.token))
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, "github-receiver")
    }

    fn search_query(&self) -> String {
        format!(
            r#"is:issue in:title is:open org:{} label:"{}""#,
            self.owner, self.alert_label
        )
    }
}

#[async_trait]
impl IssueTracker for GitHubTracker {
    /// Only "open" issues are listed; closed ones accumulate forever.
    async fn list_open_issues(&self) -> Result<Vec<TrackedIssue>> {
        let query = self.search_query();
        let mut all_issues = Vec::new();
        let mut page: u32 = 1;

        loop {
            let page_param = page.to_string();
            let resp = self
                .request(Method::GET, self.endpoint(&["search", "issues"]))
                .query(&[
                    ("q", query.as_str()),
                    ("per_page", "100"),
                    ("page", page_param.as_str()),
                ])
                .send()
                .await?;
            let resp = check(resp, "list_open_issues").await?;
            let next = next_page(resp.headers());

            let result: SearchResult = resp.json().await?;
            for issue in result.items {
                debug!(title = %issue.title, page, "ListOpenIssues");
                all_issues.push(issue.into_tracked());
            }

            match next {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }

        Ok(all_issues)
    }

    async fn create_issue(
        &self,
        repo: &str,
        title: &str,
        body: &str,
        extra_labels: &[String],
    ) -> Result<TrackedIssue> {
        let mut labels = vec![self.alert_label.as_str()];
        labels.extend(extra_labels.iter().map(String::as_str));

        let request = CreateIssueRequest { title, body, labels };
        let resp = self
            .request(Method::POST, self.endpoint(&["repos", self.owner.as_str(), repo, "issues"]))
            .json(&request)
            .send()
            .await?;
        let issue: GitHubIssue = check(resp, "create_issue").await?.json().await?;

        info!(repo, title, number = issue.number, "Created issue");
        Ok(issue.into_tracked())
    }

    async fn label_issue(&self, issue: &TrackedIssue, label: &str, add: bool) -> Result<()> {
        let (owner, repo) = split_repository(issue)?;
        let number = issue.number.to_string();

        if add {
            let resp = self
                .request(
                    Method::POST,
                    self.endpoint(&["repos", owner, repo, "issues", number.as_str(), "labels"]),
                )
                .json(&LabelsRequest { labels: [label] })
                .send()
                .await?;
            check(resp, "add_label").await?;
            return Ok(());
        }

        let resp = self
            .request(
                Method::DELETE,
                self.endpoint(&["repos", owner, repo, "issues", number.as_str(), "labels", label]),
            )
            .send()
            .await?;
        // Removing a label the issue does not have is not an error.
        if resp.status() == StatusCode::NOT_FOUND {
            debug!(number = issue.number, label, "Label was not present");
            return Ok(());
        }
        check(resp, "remove_label").await?;
        Ok(())
    }

    /// Closing an already closed issue has no effect.
    async fn close_issue(&self, issue: &TrackedIssue) -> Result<TrackedIssue> {
        let (owner, repo) = split_repository(issue)?;
        let number = issue.number.to_string();

        let resp = self
            .request(
                Method::PATCH,
                self.endpoint(&["repos", owner, repo, "issues", number.as_str()]),
            )
            .json(&StateRequest { state: "closed" })
            .send()
            .await?;
        let closed: GitHubIssue = check(resp, "close_issue").await?.json().await?;

        info!(repository = %issue.repository, number = issue.number, "Closed issue");
        Ok(closed.into_tracked())
    }

    async fn assign_issue_to_project(&self, issue: &TrackedIssue, column_id: i64) -> Result<()> {
        let column = column_id.to_string();
        let resp = self
            .request(
                Method::POST,
                self.endpoint(&["projects", "columns", column.as_str(), "cards"]),
            )
            .json(&ProjectCardRequest {
                content_id: issue.id,
                content_type: "Issue",
            })
            .send()
            .await?;
        check(resp, "assign_issue_to_project").await?;
        debug!(number = issue.number, column_id, "Added issue to project column");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn parses_repository_urls() {
        assert_eq!(
            repository_from_url("https://api.github.com/repos/fake-org/fake-repo"),
            Some("fake-org/fake-repo".to_string())
        );
        assert_eq!(
            repository_from_url("https://github.example.com/api/v3/repos/org/repo"),
            Some("org/repo".to_string())
        );
        assert_eq!(repository_from_url("https://api.github.com/users/fake-org"), None);
        assert_eq!(repository_from_url("fake-repo"), None);
        assert_eq!(repository_from_url(""), None);
    }

    #[test]
    fn reads_next_page_from_link_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(next_page(&headers), None);

        headers.insert(
            LINK,
            HeaderValue::from_static(
                r#"<https://api.github.com/search/issues?q=x&page=3>; rel="next", <https://api.github.com/search/issues?q=x&page=9>; rel="last""#,
            ),
        );
        assert_eq!(next_page(&headers), Some(3));

        headers.insert(
            LINK,
            HeaderValue::from_static(r#"<https://api.github.com/search/issues?page=1>; rel="prev""#),
        );
        assert_eq!(next_page(&headers), None);
    }

    #[test]
    fn issue_without_repository_cannot_be_edited() {
        let issue = GitHubIssue {
            id: 1,
            number: 1,
            title: "DiskRunningFull".to_string(),
            body: None,
            labels: Vec::new(),
            state: Some("open".to_string()),
            repository_url: None,
            html_url: None,
        }
        .into_tracked();

        assert!(issue.is_open);
        assert!(matches!(split_repository(&issue), Err(Error::Tracker(_))));
    }

    #[test]
    fn rejects_invalid_api_url() {
        let config = GitHubConfig {
            api_url: "not a url".to_string(),
            owner: "fake-org".to_string(),
            token: "token".to_string(),
            alert_label: "alert:boom:".to_string(),
            timeout: Duration::from_secs(15),
        };
        assert!(matches!(GitHubTracker::new(config), Err(Error::Config(_))));
    }
}
