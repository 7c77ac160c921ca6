use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use lazy_static::lazy_static;
use std::sync::Arc;
use std::time::Instant;
use tera::{Context, Tera};
use tracing::{debug, error, warn};

use super::Server;
use crate::{metrics, notification::Notification, Error};

const ISSUES_PAGE: &str = "issues.html";

// Named *.html so tera escapes issue titles.
const ISSUES_TEMPLATE: &str = r#"<html>
<head><title>Alert issues</title></head>
<body>
<h2>Open alert issues</h2>
<table>
{%- for issue in issues %}
<tr><td><a href="{{ issue.html_url }}">{{ issue.title }}</a></td></tr>
{%- endfor %}
</table>
<a href="/metrics">Metrics</a>
</body>
</html>
"#;

lazy_static! {
    static ref PAGES: Tera = {
        let mut tera = Tera::default();
        tera.add_raw_template(ISSUES_PAGE, ISSUES_TEMPLATE)
            .expect("valid issues page template");
        tera
    };
}

/// Alertmanager webhook. Replies with an empty body; only the status matters.
pub async fn receive(State(server): State<Arc<Server>>, body: Bytes) -> StatusCode {
    let started = Instant::now();
    let code = match handle(&server, &body).await {
        Ok(()) => StatusCode::OK,
        Err(e) => e.status_code(),
    };

    metrics::RECEIVER_DURATION_SECONDS
        .with_label_values(&[code.as_str()])
        .observe(started.elapsed().as_secs_f64());
    code
}

async fn handle(server: &Server, body: &[u8]) -> crate::Result<()> {
    let msg = Notification::decode(body).map_err(|e| {
        warn!(error = %e, "Rejecting malformed notification");
        e
    })?;
    debug!(
        group_key = %msg.group_key,
        status = %msg.status,
        alerts = msg.alerts.len(),
        "Received notification"
    );

    server.reconciler.reconcile(&msg).await.map_err(|e| {
        error!(group_key = %msg.group_key, error = %e, "Failed to reconcile notification");
        e
    })
}

/// Human readable list of the open alert issues.
pub async fn list_issues(State(server): State<Arc<Server>>) -> Response {
    match render_issues(&server).await {
        Ok(page) => Html(page).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to list issues");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn render_issues(server: &Server) -> crate::Result<String> {
    let issues = server.tracker.list_open_issues().await?;

    let mut context = Context::new();
    context.insert("issues", &issues);
    PAGES
        .render(ISSUES_PAGE, &context)
        .map_err(|e| Error::Template(crate::error_chain(&e)))
}

pub async fn metrics() -> Response {
    match metrics::gather_metrics() {
        Ok(text) => text.into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn method_not_allowed() -> StatusCode {
    StatusCode::METHOD_NOT_ALLOWED
}
