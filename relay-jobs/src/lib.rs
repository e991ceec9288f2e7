// ABOUTME: Remote job abstraction for relay.
// ABOUTME: Provides the job catalog, lifecycle state machine and pluggable build backends.

pub mod catalog;
pub mod config;
pub mod describe;
pub mod job;
pub mod registry;
pub mod runner;
pub mod traits;
pub mod update;

pub mod backends;

pub use catalog::{reload, JobCatalog, SharedCatalog};
pub use config::BackendConfig;
pub use describe::{JobDetails, ParameterDefinition};
pub use job::RemoteJob;
pub use registry::{BackendRegistry, ServerFactory};
pub use runner::{spawn_run, RunSettings};
pub use traits::{
    BuildStatus, Job, JobServer, QueueId, QueueStatus, StatusSource, UpdateReceiver,
};
pub use update::{reaction, JobArgs, LifecycleUpdate};
