use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{IssueTracker, TrackedIssue};
use crate::{Error, Result};

/// In-process tracker for local and demo operation. Issues are keyed by title
/// and kept in creation order; closing an issue removes it.
pub struct MemoryTracker {
    alert_label: String,
    issues: RwLock<Vec<TrackedIssue>>,
}

impl MemoryTracker {
    pub fn new(alert_label: impl Into<String>) -> Self {
        Self {
            alert_label: alert_label.into(),
            issues: RwLock::new(Vec::new()),
        }
    }

    #[cfg(test)]
    async fn get_issue(&self, number: u64) -> Result<TrackedIssue> {
        let issues = self.issues.read().await;
        issues
            .iter()
            .find(|issue| issue.number == number)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("issue #{}", number)))
    }
}

// Derives a stable id from the title's hash.
fn generate_id(title: &str) -> u64 {
    let digest = Sha256::digest(title.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    // Fits in an i64.
    u64::from_be_bytes(bytes) >> 1
}

#[async_trait]
impl IssueTracker for MemoryTracker {
    async fn list_open_issues(&self) -> Result<Vec<TrackedIssue>> {
        let issues = self.issues.read().await;
        for issue in issues.iter() {
            debug!(title = %issue.title, "ListOpenIssues");
        }
        Ok(issues.clone())
    }

    async fn create_issue(
        &self,
        repo: &str,
        title: &str,
        body: &str,
        extra_labels: &[String],
    ) -> Result<TrackedIssue> {
        let mut issues = self.issues.write().await;

        let mut labels = BTreeSet::new();
        labels.insert(self.alert_label.clone());
        labels.extend(extra_labels.iter().cloned());

        let number = issues.iter().map(|issue| issue.number).max().unwrap_or(0) + 1;
        let issue = TrackedIssue {
            id: generate_id(title),
            number,
            title: title.to_string(),
            body: body.to_string(),
            labels,
            is_open: true,
            repository: repo.to_string(),
            html_url: String::new(),
        };

        // A title identifies at most one open issue.
        issues.retain(|existing| existing.title != title);
        issues.push(issue.clone());
        info!(repo, title, number, "Created in-memory issue");
        Ok(issue)
    }

    async fn label_issue(&self, issue: &TrackedIssue, label: &str, add: bool) -> Result<()> {
        let mut issues = self.issues.write().await;
        let stored = issues
            .iter_mut()
            .find(|stored| stored.title == issue.title)
            .ok_or_else(|| Error::NotFound(format!("unknown issue: {}", issue.title)))?;

        if add {
            stored.labels.insert(label.to_string());
        } else {
            stored.labels.remove(label);
        }
        Ok(())
    }

    async fn close_issue(&self, issue: &TrackedIssue) -> Result<TrackedIssue> {
        let mut issues = self.issues.write().await;
        let position = issues
            .iter()
            .position(|stored| stored.title == issue.title)
            .ok_or_else(|| Error::NotFound(format!("unknown issue: {}", issue.title)))?;

        let mut closed = issues.remove(position);
        closed.is_open = false;
        info!(title = %closed.title, number = closed.number, "Closed in-memory issue");
        Ok(closed)
    }

    async fn assign_issue_to_project(&self, issue: &TrackedIssue, column_id: i64) -> Result<()> {
        debug!(title = %issue.title, column_id, "Project assignment is a no-op in memory");
        Ok(())
    }
}
