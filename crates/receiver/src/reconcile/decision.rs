use tracing::warn;

use crate::notification::{AlertEntry, KV};
use crate::tracker::TrackedIssue;

/// Annotation holding extra, comma separated, labels for a new issue.
pub const LABELS_ANNOTATION: &str = "github-labels";
/// Annotation holding the project column a new issue is added to.
pub const PROJECT_COLUMN_ANNOTATION: &str = "github-project-column-id";

/// A single tracker operation chosen for a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    CreateIssue {
        repo: String,
        title: String,
        body: String,
        labels: Vec<String>,
        project_column: Option<i64>,
    },
    RemoveLabel {
        issue: TrackedIssue,
        label: String,
    },
    ApplyLabel {
        issue: TrackedIssue,
        label: String,
    },
    CloseIssue {
        issue: TrackedIssue,
    },
    NoOp,
}

impl Decision {
    pub fn name(&self) -> &'static str {
        match self {
            Decision::CreateIssue { .. } => "create_issue",
            Decision::RemoveLabel { .. } => "remove_label",
            Decision::ApplyLabel { .. } => "apply_label",
            Decision::CloseIssue { .. } => "close_issue",
            Decision::NoOp => "noop",
        }
    }

    pub fn is_write(&self) -> bool {
        !matches!(self, Decision::NoOp)
    }
}

/// Issue settings carried in the first alert's annotations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueExtras {
    pub labels: Vec<String>,
    pub project_column: Option<i64>,
}

impl IssueExtras {
    pub fn from_alerts(alerts: &[AlertEntry]) -> Self {
        alerts
            .first()
            .map(|alert| Self::from_annotations(&alert.annotations))
            .unwrap_or_default()
    }

    pub fn from_annotations(annotations: &KV) -> Self {
        let labels = annotations
            .get(LABELS_ANNOTATION)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|label| !label.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let project_column = match annotations.get(PROJECT_COLUMN_ANNOTATION) {
            None => None,
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(0) => None,
                Ok(column) => Some(column),
                Err(e) => {
                    warn!(
                        value = %raw,
                        error = %e,
                        "Invalid project column id in annotations; issue will not be assigned to a project"
                    );
                    None
                }
            },
        };

        Self {
            labels,
            project_column,
        }
    }
}

/// Configured labels followed by annotation labels, without duplicates.
pub fn merge_labels(configured: &[String], extra: &[String]) -> Vec<String> {
    let mut labels: Vec<String> = Vec::with_capacity(configured.len() + extra.len());
    for label in configured.iter().chain(extra) {
        if !labels.contains(label) {
            labels.push(label.clone());
        }
    }
    labels
}
