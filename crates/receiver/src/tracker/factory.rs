use crate::config::{TrackerConfig, TrackerKind};
use crate::tracker::{GitHubConfig, GitHubTracker, IssueTracker, MemoryTracker};
use std::sync::Arc;
use tracing::info;

pub fn create_tracker(config: &TrackerConfig) -> crate::Result<Arc<dyn IssueTracker>> {
    match config.kind {
        TrackerKind::Memory => {
            info!("Using in-memory issue tracker");
            Ok(Arc::new(MemoryTracker::new(config.alert_label.clone())))
        }
        TrackerKind::GitHub => {
            info!(owner = %config.owner, api_url = %config.api_url, "Using GitHub issue tracker");
            Ok(Arc::new(GitHubTracker::new(GitHubConfig {
                api_url: config.api_url.clone(),
                owner: config.owner.clone(),
                token: config.token.clone(),
                alert_label: config.alert_label.clone(),
                timeout: config.timeout,
            })?))
        }
    }
}
