//! Reconciliation of Alertmanager notifications with tracker issues
//!
//! Nothing is remembered between notifications. For every notification the
//! open issues are listed again and the issue whose title equals the rendered
//! title is taken as the issue for that alert group:
//!
//! | status   | matching issue | decisions                                  |
//! |----------|----------------|--------------------------------------------|
//! | firing   | no             | create issue                               |
//! | firing   | yes            | remove resolved label                      |
//! | resolved | yes            | apply resolved label, close if auto-close  |
//! | resolved | no             | nothing                                    |

mod decision;
mod matcher;

pub use decision::{merge_labels, Decision, IssueExtras, LABELS_ANNOTATION, PROJECT_COLUMN_ANNOTATION};
pub use matcher::{find_match, resolve_repo};

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    config::ReceiverConfig,
    metrics::{CREATED_ISSUES_TOTAL, RECEIVED_ALERTS_TOTAL},
    notification::{AlertStatus, Notification},
    template::TemplateSet,
    tracker::{IssueTracker, TrackedIssue},
    Result,
};

pub struct Reconciler {
    tracker: Arc<dyn IssueTracker>,
    config: ReceiverConfig,
    templates: TemplateSet,
}

impl Reconciler {
    pub fn new(tracker: Arc<dyn IssueTracker>, config: ReceiverConfig, templates: TemplateSet) -> Self {
        Self {
            tracker,
            config,
            templates,
        }
    }

    pub fn tracker(&self) -> Arc<dyn IssueTracker> {
        self.tracker.clone()
    }

    /// Brings the tracker in line with one notification. The first failing
    /// tracker call aborts the rest; nothing is rolled back or retried.
    pub async fn reconcile(&self, msg: &Notification) -> Result<()> {
        let title = self.templates.render_title(msg)?;

        let issues = self.tracker.list_open_issues().await?;
        let found = find_match(&title, &issues);
        if let Some(issue) = found {
            debug!(group_key = %msg.group_key, number = issue.number, title = %title, "Found matching issue");
        }

        RECEIVED_ALERTS_TOTAL
            .with_label_values(&[msg.alert_name(), msg.status.as_str()])
            .inc();

        let decisions = self.plan(msg, title, found)?;
        let writes = decisions.iter().filter(|decision| decision.is_write()).count();
        for decision in decisions {
            self.execute(msg, decision).await?;
        }
        debug!(group_key = %msg.group_key, writes, "Reconciled notification");
        Ok(())
    }

    /// Tracker operations for `msg`, in execution order.
    pub fn plan(&self, msg: &Notification, title: String, found: Option<&TrackedIssue>) -> Result<Vec<Decision>> {
        let resolved_label = &self.config.resolved_label;

        let decisions = match (msg.status, found) {
            (AlertStatus::Firing, None) => {
                let body = self.templates.render_body(msg)?;
                let extras = IssueExtras::from_alerts(&msg.alerts);
                vec![Decision::CreateIssue {
                    repo: resolve_repo(msg, &self.config.default_repo).to_string(),
                    title,
                    body,
                    labels: merge_labels(&self.config.extra_labels, &extras.labels),
                    project_column: extras.project_column,
                }]
            }
            // Re-fired: title and body stay as they are.
            (AlertStatus::Firing, Some(issue)) if !resolved_label.is_empty() => {
                vec![Decision::RemoveLabel {
                    issue: issue.clone(),
                    label: resolved_label.clone(),
                }]
            }
            // Alertmanager repeats resolved notifications until its
            // resolve_timeout passes, so this runs several times per alert.
            (AlertStatus::Resolved, Some(issue)) => {
                let mut decisions = Vec::new();
                if !resolved_label.is_empty() {
                    decisions.push(Decision::ApplyLabel {
                        issue: issue.clone(),
                        label: resolved_label.clone(),
                    });
                }
                if self.config.auto_close {
                    decisions.push(Decision::CloseIssue {
                        issue: issue.clone(),
                    });
                }
                decisions
            }
            _ => Vec::new(),
        };

        if decisions.is_empty() {
            return Ok(vec![Decision::NoOp]);
        }
        Ok(decisions)
    }

    async fn execute(&self, msg: &Notification, decision: Decision) -> Result<()> {
        debug!(group_key = %msg.group_key, decision = decision.name(), "Executing decision");

        match decision {
            Decision::CreateIssue {
                repo,
                title,
                body,
                labels,
                project_column,
            } => {
                let issue = self.tracker.create_issue(&repo, &title, &body, &labels).await?;
                CREATED_ISSUES_TOTAL.with_label_values(&[msg.alert_name()]).inc();
                info!(group_key = %msg.group_key, repo = %repo, number = issue.number, "Created issue");

                // Only new issues are added to a project. Failing to do so
                // does not fail the notification.
                if let Some(column_id) = project_column {
                    if let Err(e) = self.tracker.assign_issue_to_project(&issue, column_id).await {
                        warn!(
                            group_key = %msg.group_key,
                            number = issue.number,
                            column_id,
                            error = %e,
                            "Failed to assign issue to project"
                        );
                    }
                }
            }
            Decision::RemoveLabel { issue, label } => {
                self.tracker.label_issue(&issue, &label, false).await?;
            }
            Decision::ApplyLabel { issue, label } => {
                self.tracker.label_issue(&issue, &label, true).await?;
            }
            Decision::CloseIssue { issue } => {
                self.tracker.close_issue(&issue).await?;
                info!(group_key = %msg.group_key, number = issue.number, "Closed issue");
            }
            Decision::NoOp => {
                debug!(group_key = %msg.group_key, status = %msg.status, "Nothing to do");
            }
        }
        Ok(())
    }
}
