use anyhow::Context;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use github_receiver::{
    config::Config,
    reconcile::Reconciler,
    server::Server,
    template::TemplateSet,
    tracker::create_tracker,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load().context("invalid configuration")?;
    info!("Loaded configuration: {:?}", config);

    let templates = TemplateSet::from_files(
        &config.templates.title_files,
        config.templates.body_file.as_deref(),
    )
    .context("failed to load templates")?;

    let tracker = create_tracker(&config.tracker)?;
    let reconciler = Arc::new(Reconciler::new(tracker, config.receiver.clone(), templates));

    Server::new(reconciler)
        .start(&config.server.addr)
        .await
        .context("server failed")?;

    Ok(())
}
