mod factory;
mod github;
mod memory;

pub use factory::create_tracker;
pub use github::{GitHubConfig, GitHubTracker, DEFAULT_API_URL};
pub use memory::MemoryTracker;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An issue as seen through the tracker. Only ever held for the duration of
/// one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedIssue {
    pub id: u64,
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub labels: BTreeSet<String>,
    pub is_open: bool,
    /// "owner/repo" the issue lives in. Empty when the tracker could not tell.
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub html_url: String,
}

impl TrackedIssue {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }
}

/// Operations the receiver needs from an issue tracker.
///
/// Labeling is idempotent: adding a label that is already present succeeds,
/// and removing a label that is not present is not an error.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// All open issues carrying the alert label, across every page.
    async fn list_open_issues(&self) -> crate::Result<Vec<TrackedIssue>>;

    /// Creates an issue tagged with the alert label plus `extra_labels`.
    async fn create_issue(
        &self,
        repo: &str,
        title: &str,
        body: &str,
        extra_labels: &[String],
    ) -> crate::Result<TrackedIssue>;

    async fn label_issue(&self, issue: &TrackedIssue, label: &str, add: bool) -> crate::Result<()>;

    async fn close_issue(&self, issue: &TrackedIssue) -> crate::Result<TrackedIssue>;

    /// Adds the issue as a card to a project column.
    async fn assign_issue_to_project(&self, issue: &TrackedIssue, column_id: i64) -> crate::Result<()>;
}
