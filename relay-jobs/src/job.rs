// ABOUTME: RemoteJob ties job metadata to a StatusSource.
// ABOUTME: Running it spawns the state-machine runner on its own task.

use crate::describe::JobDetails;
use crate::runner::{spawn_run, RunSettings};
use crate::traits::{Job, StatusSource, UpdateReceiver};
use crate::update::JobArgs;
use std::sync::Arc;

/// A job backed by a remote build system
pub struct RemoteJob {
    details: JobDetails,
    source: Arc<dyn StatusSource>,
    settings: RunSettings,
}

impl RemoteJob {
    pub fn new(details: JobDetails, source: Arc<dyn StatusSource>, settings: RunSettings) -> Self {
        Self {
            details,
            source,
            settings,
        }
    }

    pub fn details(&self) -> &JobDetails {
        &self.details
    }
}

impl std::fmt::Debug for RemoteJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteJob")
            .field("details", &self.details)
            .field("settings", &self.settings)
            .finish()
    }
}

impl Job for RemoteJob {
    fn name(&self) -> &str {
        &self.details.name
    }

    fn description(&self) -> &str {
        &self.details.description
    }

    fn describe(&self) -> String {
        self.details.render()
    }

    fn run(&self, args: JobArgs) -> UpdateReceiver {
        spawn_run(
            Arc::clone(&self.source),
            self.details.name.clone(),
            args,
            self.settings,
        )
    }
}
