#![allow(dead_code)]

use async_trait::async_trait;
use github_receiver::{
    config::ReceiverConfig,
    reconcile::Reconciler,
    server::Server,
    template::TemplateSet,
    tracker::{IssueTracker, TrackedIssue},
    Error, Result,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Alertmanager webhook payload with one alert.
pub fn payload(alertname: &str, status: &str) -> Value {
    json!({
        "version": "4",
        "groupKey": format!("{{}}:{{alertname=\"{}\"}}", alertname),
        "status": status,
        "receiver": "github-receiver",
        "groupLabels": {"alertname": alertname},
        "commonLabels": {"alertname": alertname, "severity": "page"},
        "commonAnnotations": {},
        "externalURL": "http://alertmanager:9093",
        "alerts": [{
            "status": status,
            "labels": {"alertname": alertname, "instance": "example4"},
            "annotations": {"description": "disk is almost full"},
            "startsAt": "2017-06-28T01:40:00Z",
            "endsAt": "0001-01-01T00:00:00Z",
            "generatorURL": "http://prometheus:9090/graph"
        }]
    })
}

pub fn receiver_config(auto_close: bool) -> ReceiverConfig {
    ReceiverConfig {
        default_repo: "default".to_string(),
        auto_close,
        ..Default::default()
    }
}

pub fn test_server(tracker: Arc<dyn IssueTracker>, config: ReceiverConfig) -> axum_test::TestServer {
    let reconciler = Reconciler::new(tracker, config, TemplateSet::defaults().unwrap());
    axum_test::TestServer::new(Server::new(Arc::new(reconciler)).build_router()).unwrap()
}

/// Tracker whose every call fails.
pub struct FailingTracker;

#[async_trait]
impl IssueTracker for FailingTracker {
    async fn list_open_issues(&self) -> Result<Vec<TrackedIssue>> {
        Err(Error::Tracker("Fake error listing current issues".to_string()))
    }

    async fn create_issue(&self, _repo: &str, _title: &str, _body: &str, _labels: &[String]) -> Result<TrackedIssue> {
        Err(Error::Tracker("Fake error creating issue".to_string()))
    }

    async fn label_issue(&self, _issue: &TrackedIssue, _label: &str, _add: bool) -> Result<()> {
        Err(Error::Tracker("Fake error labeling issue".to_string()))
    }

    async fn close_issue(&self, _issue: &TrackedIssue) -> Result<TrackedIssue> {
        Err(Error::Tracker("Fake error closing issue".to_string()))
    }

    async fn assign_issue_to_project(&self, _issue: &TrackedIssue, _column_id: i64) -> Result<()> {
        Err(Error::Tracker("Fake error assigning issue".to_string()))
    }
}
