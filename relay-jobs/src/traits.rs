// ABOUTME: Core capabilities that job backends implement.
// ABOUTME: Job (describe/run), JobServer (enumerate jobs) and StatusSource (trigger/poll).

use crate::update::{JobArgs, LifecycleUpdate};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Receiving side of a job run. Yields updates in order and closes after the
/// terminal (`done == true`) update.
pub type UpdateReceiver = mpsc::Receiver<LifecycleUpdate>;

/// A named, remotely executable unit of work.
///
/// Implementations are immutable once constructed. Running the same job
/// concurrently is allowed; every call to `run` gets its own update stream.
pub trait Job: Send + Sync {
    /// Job name, unique within a catalog
    fn name(&self) -> &str;

    /// Short free-text description from the remote system
    fn description(&self) -> &str;

    /// Full chat-ready description including parameter definitions
    fn describe(&self) -> String;

    /// Start the job with `args` on a background task.
    ///
    /// Must be called from within a tokio runtime.
    fn run(&self, args: JobArgs) -> UpdateReceiver;
}

/// Source of jobs for the catalog (Jenkins, mock, ...)
#[async_trait]
pub trait JobServer: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Query the remote system for every job it defines
    async fn load(&self) -> Result<Vec<Arc<dyn Job>>>;
}

/// Opaque handle to a queued build request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueId(pub u64);

/// Queue state of a build request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStatus {
    /// Build number assigned by the remote system. `0` means the request is
    /// still waiting for an executor.
    pub build_number: u64,
}

impl QueueStatus {
    pub fn is_assigned(&self) -> bool {
        self.build_number != 0
    }
}

/// Execution state of a build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStatus {
    /// Whether the build is still executing
    pub building: bool,
    /// Detail page for the build
    pub url: String,
}

/// Where the runner gets build state from.
///
/// The runner polls this on a fixed interval; a push-based implementation
/// can answer from cached webhook state without changing the update sequence.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Ask the remote system to start `job`
    async fn trigger(&self, job: &str, args: &JobArgs) -> Result<QueueId>;

    /// Current queue state for a triggered request
    async fn queue_status(&self, queue: QueueId) -> Result<QueueStatus>;

    /// Current state of a numbered build
    async fn build_status(&self, job: &str, number: u64) -> Result<BuildStatus>;
}
