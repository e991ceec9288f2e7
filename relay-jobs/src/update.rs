// ABOUTME: Lifecycle updates emitted while a remote job runs.
// ABOUTME: Each update pairs a chat reply with a reaction marker; the last one is done.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reaction markers used to mirror job state on the triggering message
pub mod reaction {
    /// Command was accepted and is being acted on
    pub const ACKNOWLEDGED: &str = "+1";
    /// Remote system queued the build
    pub const QUEUED: &str = "stopwatch";
    /// Remote system is executing the build
    pub const RUNNING: &str = "gear";
    /// Build finished
    pub const SUCCESS: &str = "heavy_check_mark";
    /// Invocation or polling failed
    pub const FAILURE: &str = "boom";
}

/// Key/value arguments passed to a job run
pub type JobArgs = BTreeMap<String, String>;

/// One element of the ordered stream emitted by `Job::run`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleUpdate {
    /// Text to reply with
    pub message: String,
    /// Symbolic reaction name to apply to the triggering message
    pub reaction: String,
    /// True for the terminal update
    pub done: bool,
}

impl LifecycleUpdate {
    pub fn new(message: impl Into<String>, reaction: impl Into<String>, done: bool) -> Self {
        Self {
            message: message.into(),
            reaction: reaction.into(),
            done,
        }
    }

    /// Idle -> Queued
    pub fn queued(job: &str) -> Self {
        Self::new(
            format!("Execution for job `{}` was queued", job),
            reaction::QUEUED,
            false,
        )
    }

    /// Queued -> Running
    pub fn running(job: &str, args: &JobArgs, url: &str) -> Self {
        Self::new(
            format!(
                "Building `{}` with parameters `{}` ({})",
                job,
                format_args_map(args),
                url
            ),
            reaction::RUNNING,
            false,
        )
    }

    /// Running -> Finished
    pub fn finished(job: &str) -> Self {
        Self::new(format!("Job `{}` completed", job), reaction::SUCCESS, true)
    }

    /// any -> Failed
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(message, reaction::FAILURE, true)
    }

    pub fn is_failure(&self) -> bool {
        self.done && self.reaction == reaction::FAILURE
    }
}

/// Render job arguments as `{KEY: value, ...}` for chat output
pub fn format_args_map(args: &JobArgs) -> String {
    let pairs: Vec<String> = args.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
    format!("{{{}}}", pairs.join(", "))
}
