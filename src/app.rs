// ABOUTME: Start-up wiring: job backend, catalog, processors and the chat transport.
// ABOUTME: Generic over ChatPlatform so the same path runs against Slack or a test double.

use crate::platform::SlackPlatform;
use anyhow::{Context, Result};
use relay_core::config::Config;
use relay_jobs::{reload, BackendRegistry, JobCatalog, JobServer, SharedCatalog};
use relay_core::{Chat, ChatApi, ChatPlatform, JobControl, ProcessorRegistry};
use std::sync::Arc;

/// Create the job server selected by `jobs.backend`
pub fn job_server(config: &Config) -> Result<Arc<dyn JobServer>> {
    let registry = BackendRegistry::default();
    registry.create_from_config(&config.jobs).with_context(|| {
        format!(
            "Failed to create job backend (available: {})",
            registry.available().join(", ")
        )
    })
}

/// Load a fresh catalog from `server`
pub async fn load_catalog(server: &dyn JobServer) -> Result<SharedCatalog> {
    let catalog = JobCatalog::new().shared();
    reload(&catalog, server)
        .await
        .with_context(|| format!("Failed to load jobs from the {} backend", server.name()))?;
    Ok(catalog)
}

/// Wire the job-control processors into a dispatcher talking to `api`
pub fn build_chat(
    api: Arc<dyn ChatApi>,
    config: &Config,
    catalog: SharedCatalog,
    server: Arc<dyn JobServer>,
) -> Result<Chat> {
    let mut registry = ProcessorRegistry::with_mode(config.dispatch.mode);
    JobControl::new(catalog, server)
        .register(&mut registry)
        .context("Failed to register job-control processors")?;

    let chat = Chat::new(api, registry, config.slack.reply_in_thread);
    chat.ensure_ready()?;
    Ok(chat)
}

/// Run the dispatch loop on `platform` until its event stream ends
pub async fn serve<P>(
    platform: Arc<P>,
    config: &Config,
    catalog: SharedCatalog,
    server: Arc<dyn JobServer>,
) -> Result<()>
where
    P: ChatPlatform + 'static,
{
    let chat = Arc::new(build_chat(platform.clone(), config, catalog, server)?);
    tracing::info!(
        platform = platform.platform_id(),
        processors = chat.registry().len(),
        mode = ?config.dispatch.mode,
        "Relay ready"
    );

    let events = platform.event_stream().await?;
    let result = chat.run(events).await;
    platform.shutdown().await?;
    result
}

/// `relay start`
pub async fn start(config: Config) -> Result<()> {
    config.validate_for_start()?;

    let server = job_server(&config)?;
    // A build server that is down at start-up is not fatal; `reload` recovers
    let catalog = match load_catalog(server.as_ref()).await {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::warn!(error = %format!("{:#}", e), "Starting with an empty job catalog");
            JobCatalog::new().shared()
        }
    };

    let platform = Arc::new(SlackPlatform::new(&config.slack).await?);
    serve(platform, &config, catalog, server).await
}

/// `relay jobs`: one job name per line
pub async fn list_jobs(config: &Config) -> Result<String> {
    let server = job_server(config)?;
    let catalog = load_catalog(server.as_ref()).await?;
    let listing = catalog.read().await.list();
    Ok(listing)
}

/// `relay check-config`
pub fn check_config(config: &Config) -> Result<String> {
    config.validate_for_start()?;
    job_server(config)?;
    Ok(format!("{:#?}", config))
}
