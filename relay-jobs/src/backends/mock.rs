// ABOUTME: Mock backend for testing - in-memory jobs and a scriptable status source.
// ABOUTME: Allows deterministic tests without a reachable build system.
//!
//! # Example
//!
//! ```no_run
//! use relay_jobs::backends::mock::MockStatusSource;
//! use relay_jobs::{spawn_run, JobArgs, RunSettings};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let source = Arc::new(MockStatusSource::new().queue_polls(2).build_polls(3));
//! let mut updates = spawn_run(source, "deploy".to_string(), JobArgs::new(), RunSettings::default());
//!
//! while let Some(update) = updates.recv().await {
//!     println!("{} :{}:", update.message, update.reaction);
//! }
//! # }
//! ```

use crate::config::BackendConfig;
use crate::registry::ServerFactory;
use crate::traits::{
    BuildStatus, Job, JobServer, QueueId, QueueStatus, StatusSource, UpdateReceiver,
};
use crate::update::{JobArgs, LifecycleUpdate};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

// =============================================================================
// MockJob - emits the happy path directly
// =============================================================================

/// In-memory job that always succeeds without polling
#[derive(Debug, Clone)]
pub struct MockJob {
    name: String,
    description: String,
    base_url: String,
}

impl MockJob {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            base_url: base_url.into(),
        }
    }
}

impl Job for MockJob {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn describe(&self) -> String {
        self.description.clone()
    }

    fn run(&self, args: JobArgs) -> UpdateReceiver {
        let (tx, rx) = mpsc::channel(4);
        let name = self.name.clone();
        let url = format!("{}/job/{}", self.base_url, self.name);
        tokio::spawn(async move {
            let updates = [
                LifecycleUpdate::queued(&name),
                LifecycleUpdate::running(&name, &args, &url),
                LifecycleUpdate::finished(&name),
            ];
            for update in updates {
                if tx.send(update).await.is_err() {
                    break;
                }
            }
        });
        rx
    }
}

// =============================================================================
// MockJobServer - catalog source built from a name -> description map
// =============================================================================

/// Job server that serves a fixed set of MockJobs
#[derive(Debug, Clone, Default)]
pub struct MockJobServer {
    jobs: BTreeMap<String, String>,
    base_url: String,
    fail_with: Option<String>,
}

impl MockJobServer {
    pub fn new(jobs: BTreeMap<String, String>, base_url: impl Into<String>) -> Self {
        Self {
            jobs,
            base_url: base_url.into(),
            fail_with: None,
        }
    }

    /// Build from `(name, description)` pairs
    pub fn with_jobs<I, N, D>(jobs: I, base_url: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = (N, D)>,
        N: Into<String>,
        D: Into<String>,
    {
        Self::new(
            jobs.into_iter().map(|(n, d)| (n.into(), d.into())).collect(),
            base_url,
        )
    }

    /// Make every `load` fail with `message`
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.fail_with = Some(message.into());
        self
    }

    /// Factory function for the registry
    pub fn factory() -> ServerFactory {
        Box::new(|config: &BackendConfig| {
            let server = MockJobServer::new(config.mock_jobs.clone(), config.base_url());
            Ok(Arc::new(server) as Arc<dyn JobServer>)
        })
    }
}

#[async_trait]
impl JobServer for MockJobServer {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn load(&self) -> Result<Vec<Arc<dyn Job>>> {
        if let Some(message) = &self.fail_with {
            return Err(anyhow!("{}", message));
        }
        Ok(self
            .jobs
            .iter()
            .map(|(name, description)| {
                Arc::new(MockJob::new(name, description, &self.base_url)) as Arc<dyn Job>
            })
            .collect())
    }
}

// =============================================================================
// MockStatusSource - scripted remote state for driving the real runner
// =============================================================================

/// Stage at which a scripted failure is injected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Trigger,
    QueueLookup,
    QueuePoll,
    BuildLookup,
    BuildPoll,
}

/// A call the runner made against the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceCall {
    Trigger { job: String, args: JobArgs },
    QueueStatus(QueueId),
    BuildStatus { job: String, number: u64 },
}

#[derive(Debug, Default)]
struct SourceState {
    queue_checks: usize,
    build_checks: usize,
    calls: Vec<SourceCall>,
}

/// Status source that reports "queued" for `queue_polls` checks and
/// "building" for `build_polls` checks before moving on.
#[derive(Debug)]
pub struct MockStatusSource {
    queue_polls: usize,
    build_polls: usize,
    build_number: u64,
    base_url: String,
    fail_at: Option<FailAt>,
    state: Mutex<SourceState>,
}

impl Default for MockStatusSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStatusSource {
    pub fn new() -> Self {
        Self {
            queue_polls: 0,
            build_polls: 0,
            build_number: 1,
            base_url: "http://mock".to_string(),
            fail_at: None,
            state: Mutex::new(SourceState::default()),
        }
    }

    /// Number of queue checks that report "no build number yet"
    pub fn queue_polls(mut self, n: usize) -> Self {
        self.queue_polls = n;
        self
    }

    /// Number of build checks that report "still building"
    pub fn build_polls(mut self, n: usize) -> Self {
        self.build_polls = n;
        self
    }

    /// Build number assigned once the queue wait is over
    pub fn build_number(mut self, n: u64) -> Self {
        self.build_number = n;
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn fail_at(mut self, stage: FailAt) -> Self {
        self.fail_at = Some(stage);
        self
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<SourceCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SourceState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check(&self, stage: FailAt) -> Result<()> {
        if self.fail_at == Some(stage) {
            return Err(anyhow!("injected {:?} failure", stage));
        }
        Ok(())
    }
}

#[async_trait]
impl StatusSource for MockStatusSource {
    async fn trigger(&self, job: &str, args: &JobArgs) -> Result<QueueId> {
        self.lock().calls.push(SourceCall::Trigger {
            job: job.to_string(),
            args: args.clone(),
        });
        self.check(FailAt::Trigger)?;
        Ok(QueueId(42))
    }

    async fn queue_status(&self, queue: QueueId) -> Result<QueueStatus> {
        let checks = {
            let mut state = self.lock();
            state.calls.push(SourceCall::QueueStatus(queue));
            state.queue_checks += 1;
            state.queue_checks
        };
        if checks == 1 {
            self.check(FailAt::QueueLookup)?;
        } else {
            self.check(FailAt::QueuePoll)?;
        }
        let build_number = if checks > self.queue_polls {
            self.build_number
        } else {
            0
        };
        Ok(QueueStatus { build_number })
    }

    async fn build_status(&self, job: &str, number: u64) -> Result<BuildStatus> {
        let checks = {
            let mut state = self.lock();
            state.calls.push(SourceCall::BuildStatus {
                job: job.to_string(),
                number,
            });
            state.build_checks += 1;
            state.build_checks
        };
        if checks == 1 {
            self.check(FailAt::BuildLookup)?;
        } else {
            self.check(FailAt::BuildPoll)?;
        }
        Ok(BuildStatus {
            building: checks <= self.build_polls,
            url: format!("{}/job/{}/{}/", self.base_url, job, number),
        })
    }
}
