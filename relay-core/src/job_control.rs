// ABOUTME: Job-control processors: list, describe, build and reload.
// ABOUTME: Build relays each lifecycle update as a reply plus a reaction swap on the request.

use crate::commands::{parse_args, CommandError};
use crate::filters::{action, Filter};
use crate::message::Message;
use crate::processor::{ProcessorName, ProcessorRegistry, RegistryError};
use anyhow::Result;
use relay_jobs::{reaction, reload, JobServer, SharedCatalog};
use std::sync::Arc;

/// Namespace every job-control processor is registered under
pub const NAMESPACE: &str = "job_control";

/// Reply to `list` when nothing is loaded
pub const EMPTY_CATALOG_HINT: &str =
    "No jobs are loaded. Use `reload` to fetch the job list from the build server";

/// Shared state for the job-control processors
#[derive(Clone)]
pub struct JobControl {
    catalog: SharedCatalog,
    server: Arc<dyn JobServer>,
}

impl std::fmt::Debug for JobControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobControl")
            .field("server", &self.server.name())
            .finish_non_exhaustive()
    }
}

/// Log a failed chat call; there is nobody else to tell
fn log_chat_error(op: &str, result: Result<()>) {
    if let Err(e) = result {
        tracing::warn!(op, error = %e, "Chat call failed");
    }
}

impl JobControl {
    pub fn new(catalog: SharedCatalog, server: Arc<dyn JobServer>) -> Self {
        Self { catalog, server }
    }

    pub fn catalog(&self) -> &SharedCatalog {
        &self.catalog
    }

    /// Reply with the job names, one per line
    pub async fn list(&self, msg: Message) {
        let listing = {
            let catalog = self.catalog.read().await;
            if catalog.is_empty() {
                EMPTY_CATALOG_HINT.to_string()
            } else {
                catalog.list()
            }
        };
        log_chat_error("reply", msg.reply(&listing, false).await);
    }

    /// Reply with a job's rendered description
    pub async fn describe(&self, msg: Message) {
        let text = {
            let catalog = self.catalog.read().await;
            match parse_args(msg.text(), "describe", &catalog) {
                Ok(parsed) => catalog
                    .get(&parsed.job)
                    .map(|job| job.describe())
                    .unwrap_or_default(),
                Err(e) => e.to_string(),
            }
        };
        log_chat_error("reply", msg.reply(&text, false).await);
    }

    /// Run a job and stream its lifecycle back into the conversation
    pub async fn build(&self, msg: Message) {
        let resolved = {
            let catalog = self.catalog.read().await;
            parse_args(msg.text(), "build", &catalog).and_then(|parsed| {
                match catalog.get(&parsed.job) {
                    Some(job) => Ok((job, parsed)),
                    None => Err(CommandError::UnknownJob(parsed.job)),
                }
            })
        };
        let (job, parsed) = match resolved {
            Ok(resolved) => resolved,
            Err(e) => {
                log_chat_error("reply", msg.reply(&e.to_string(), false).await);
                return;
            }
        };

        tracing::info!(
            job = %parsed.job,
            user = msg.user().map(|u| u.name.as_str()).unwrap_or(""),
            "Build requested"
        );
        log_chat_error("react", msg.react(reaction::ACKNOWLEDGED).await);

        let mut updates = job.run(parsed.args);
        let mut last_reaction = reaction::ACKNOWLEDGED.to_string();
        while let Some(update) = updates.recv().await {
            log_chat_error("unreact", msg.unreact(&last_reaction).await);
            log_chat_error("react", msg.react(&update.reaction).await);
            log_chat_error("reply", msg.reply(&update.message, false).await);
            if update.done {
                tracing::info!(
                    job = %parsed.job,
                    failed = update.is_failure(),
                    "Build finished"
                );
                return;
            }
            last_reaction = update.reaction;
        }
        tracing::warn!(job = %parsed.job, "Update stream closed before a terminal update");
    }

    /// Clear and rebuild the catalog from the job server
    pub async fn reload(&self, msg: Message) {
        log_chat_error("react", msg.react(reaction::ACKNOWLEDGED).await);
        match reload(&self.catalog, self.server.as_ref()).await {
            Ok(count) => {
                log_chat_error(
                    "reply",
                    msg.reply(&format!("{} jobs reloaded", count), false).await,
                );
                log_chat_error("react", msg.react(reaction::SUCCESS).await);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Reload failed");
                log_chat_error(
                    "reply",
                    msg.reply(&format!("Error happened reloading jobs: {}", e), false)
                        .await,
                );
            }
        }
    }

    /// Register `list`, `describe`, `build` and `reload`, each gated on a
    /// mention plus its command word.
    pub fn register(&self, registry: &mut ProcessorRegistry) -> Result<(), RegistryError> {
        let control = self.clone();
        registry.register(
            ProcessorName::new(NAMESPACE, "list"),
            Filter::new().mentioned().contains("list").then(action(move |msg| {
                let control = control.clone();
                async move { control.list(msg).await }
            })),
        )?;

        let control = self.clone();
        registry.register(
            ProcessorName::new(NAMESPACE, "describe"),
            Filter::new().mentioned().contains("describe").then(action(move |msg| {
                let control = control.clone();
                async move { control.describe(msg).await }
            })),
        )?;

        let control = self.clone();
        registry.register(
            ProcessorName::new(NAMESPACE, "build"),
            Filter::new().mentioned().contains("build").then(action(move |msg| {
                let control = control.clone();
                async move { control.build(msg).await }
            })),
        )?;

        let control = self.clone();
        registry.register(
            ProcessorName::new(NAMESPACE, "reload"),
            Filter::new().mentioned().contains("reload").then(action(move |msg| {
                let control = control.clone();
                async move { control.reload(msg).await }
            })),
        )?;

        Ok(())
    }
}
