use crate::notification::Notification;
use crate::tracker::TrackedIssue;

/// First open issue whose title is exactly `title`, in tracker order.
///
/// Titles are the only key shared between a notification and its issue, so
/// the comparison is byte-for-byte and case-sensitive.
pub fn find_match<'a>(title: &str, open_issues: &'a [TrackedIssue]) -> Option<&'a TrackedIssue> {
    open_issues.iter().find(|issue| issue.title == title)
}

/// Repository new issues for `msg` are filed in: the notification's common
/// "repo" label when set, otherwise `default_repo`.
pub fn resolve_repo<'a>(msg: &'a Notification, default_repo: &'a str) -> &'a str {
    match msg.common_labels.get("repo") {
        Some(repo) if !repo.is_empty() => repo.as_str(),
        _ => default_repo,
    }
}
