mod routes;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{reconcile::Reconciler, tracker::IssueTracker, Result};

/// Path Alertmanager posts notifications to.
pub const RECEIVER_PATH: &str = "/v1/receiver";

pub struct Server {
    reconciler: Arc<Reconciler>,
    tracker: Arc<dyn IssueTracker>,
}

impl Server {
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        let tracker = reconciler.tracker();
        Self { reconciler, tracker }
    }

    pub fn build_router(self) -> Router {
        let state = Arc::new(self);

        Router::new()
            .route("/", get(routes::list_issues))
            .route(RECEIVER_PATH, post(routes::receive))
            .route("/metrics", get(routes::metrics))
            .fallback(routes::method_not_allowed)
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    pub async fn start(self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %addr, "Listening for Alertmanager notifications");
        axum::serve(listener, self.build_router()).await?;
        Ok(())
    }
}
