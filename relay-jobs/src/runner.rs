// ABOUTME: Job execution state machine: Idle -> Queued -> Running -> Finished | Failed.
// ABOUTME: Polls a StatusSource and emits exactly one LifecycleUpdate per transition.

use crate::traits::{QueueId, StatusSource, UpdateReceiver};
use crate::update::{JobArgs, LifecycleUpdate};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Default delay between status checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Knobs for a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    /// Delay between status checks
    pub poll_interval: Duration,
    /// Give up after this long. `None` waits forever.
    pub deadline: Option<Duration>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            deadline: None,
        }
    }
}

/// Spawn a run of `job` against `source` and return its update stream.
pub fn spawn_run(
    source: Arc<dyn StatusSource>,
    job: String,
    args: JobArgs,
    settings: RunSettings,
) -> UpdateReceiver {
    // Capacity covers the longest sequence (queued, running, terminal) so the
    // producer never waits on a slow consumer.
    let (tx, rx) = mpsc::channel(4);
    tokio::spawn(async move {
        run(source.as_ref(), &job, &args, settings, tx).await;
    });
    rx
}

/// Drive one run to a terminal update, sending every update to `out`.
pub async fn run(
    source: &dyn StatusSource,
    job: &str,
    args: &JobArgs,
    settings: RunSettings,
    out: mpsc::Sender<LifecycleUpdate>,
) {
    tracing::info!(job = %job, args = ?args, "Starting job run");

    let outcome = match settings.deadline {
        Some(deadline) => {
            match tokio::time::timeout(deadline, drive(source, job, args, settings, &out)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(LifecycleUpdate::failed(format!(
                    "Job `{}` timed out after {}s",
                    job,
                    deadline.as_secs()
                ))),
            }
        }
        None => drive(source, job, args, settings, &out).await,
    };

    let terminal = match outcome {
        Ok(()) => {
            tracing::info!(job = %job, "Job run finished");
            LifecycleUpdate::finished(job)
        }
        Err(failure) => {
            tracing::warn!(job = %job, error = %failure.message, "Job run failed");
            failure
        }
    };
    emit(&out, terminal).await;
}

/// Runs the non-terminal part of the state machine. Returns the failure
/// update on error so the caller emits exactly one terminal update.
async fn drive(
    source: &dyn StatusSource,
    job: &str,
    args: &JobArgs,
    settings: RunSettings,
    out: &mpsc::Sender<LifecycleUpdate>,
) -> Result<(), LifecycleUpdate> {
    let queue = source
        .trigger(job, args)
        .await
        .map_err(|e| LifecycleUpdate::failed(format!("Job invoke error: {:#}", e)))?;

    let mut queued = source
        .queue_status(queue)
        .await
        .map_err(|e| LifecycleUpdate::failed(format!("Task get error: {:#}", e)))?;

    emit(out, LifecycleUpdate::queued(job)).await;

    // Build number 0 means "not yet assigned"; a legitimately numbered build 0
    // would spin here until the deadline.
    while !queued.is_assigned() {
        tokio::time::sleep(settings.poll_interval).await;
        queued = poll_queue(source, queue).await?;
    }

    let mut build = source
        .build_status(job, queued.build_number)
        .await
        .map_err(|e| LifecycleUpdate::failed(format!("Queue item get error: {:#}", e)))?;

    tracing::debug!(job = %job, number = queued.build_number, url = %build.url, "Build started");
    emit(out, LifecycleUpdate::running(job, args, &build.url)).await;

    while build.building {
        tokio::time::sleep(settings.poll_interval).await;
        build = source
            .build_status(job, queued.build_number)
            .await
            .map_err(|e| LifecycleUpdate::failed(format!("Error polling build: {:#}", e)))?;
    }

    Ok(())
}

async fn poll_queue(
    source: &dyn StatusSource,
    queue: QueueId,
) -> Result<crate::traits::QueueStatus, LifecycleUpdate> {
    source
        .queue_status(queue)
        .await
        .map_err(|e| LifecycleUpdate::failed(format!("Error polling queue: {:#}", e)))
}

async fn emit(out: &mpsc::Sender<LifecycleUpdate>, update: LifecycleUpdate) {
    if out.send(update).await.is_err() {
        tracing::debug!("Update receiver dropped");
    }
}
