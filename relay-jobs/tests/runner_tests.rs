// ABOUTME: Tests for the job lifecycle state machine.
// ABOUTME: Drives the runner with a scripted MockStatusSource and checks the update sequence.

use relay_jobs::backends::mock::{FailAt, MockStatusSource, SourceCall};
use relay_jobs::{
    reaction, spawn_run, Job, JobArgs, JobDetails, LifecycleUpdate, RemoteJob, RunSettings,
    UpdateReceiver,
};
use std::sync::Arc;
use std::time::Duration;

async fn collect(mut rx: UpdateReceiver) -> Vec<LifecycleUpdate> {
    let mut updates = Vec::new();
    while let Some(update) = rx.recv().await {
        updates.push(update);
    }
    updates
}

fn args(pairs: &[(&str, &str)]) -> JobArgs {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_happy_path_emits_three_updates_in_order() {
    let source = Arc::new(MockStatusSource::new().queue_polls(3).build_polls(2));
    let rx = spawn_run(
        source.clone(),
        "test".to_string(),
        JobArgs::new(),
        RunSettings::default(),
    );

    let updates = collect(rx).await;
    assert_eq!(
        updates,
        vec![
            LifecycleUpdate::queued("test"),
            LifecycleUpdate::running("test", &JobArgs::new(), "http://mock/job/test/1/"),
            LifecycleUpdate::finished("test"),
        ]
    );
    assert_eq!(updates.iter().filter(|u| u.done).count(), 1);
    assert!(updates.last().map(|u| u.done).unwrap_or(false));
}

#[tokio::test(start_paused = true)]
async fn test_runner_polls_until_assigned_and_finished() {
    let source = Arc::new(
        MockStatusSource::new()
            .queue_polls(2)
            .build_polls(3)
            .build_number(17),
    );
    let rx = spawn_run(
        source.clone(),
        "deploy".to_string(),
        args(&[("INDEX", "users")]),
        RunSettings::default(),
    );
    let updates = collect(rx).await;
    assert_eq!(updates.len(), 3);
    assert_eq!(
        updates[1].message,
        "Building `deploy` with parameters `{INDEX: users}` (http://mock/job/deploy/17/)"
    );

    let calls = source.calls();
    assert_eq!(
        calls[0],
        SourceCall::Trigger {
            job: "deploy".to_string(),
            args: args(&[("INDEX", "users")]),
        }
    );
    let queue_checks = calls
        .iter()
        .filter(|c| matches!(c, SourceCall::QueueStatus(_)))
        .count();
    let build_checks = calls
        .iter()
        .filter(|c| matches!(c, SourceCall::BuildStatus { number: 17, .. }))
        .count();
    // Initial lookup plus one poll per unassigned answer
    assert_eq!(queue_checks, 3);
    // Initial lookup plus one poll per "still building" answer
    assert_eq!(build_checks, 4);
}

#[tokio::test(start_paused = true)]
async fn test_trigger_failure_emits_single_failure() {
    let source = Arc::new(MockStatusSource::new().fail_at(FailAt::Trigger));
    let updates = collect(spawn_run(
        source,
        "test".to_string(),
        JobArgs::new(),
        RunSettings::default(),
    ))
    .await;

    assert_eq!(updates.len(), 1);
    assert!(updates[0].done);
    assert_eq!(updates[0].reaction, reaction::FAILURE);
    assert!(updates[0].message.starts_with("Job invoke error:"));
}

#[tokio::test(start_paused = true)]
async fn test_queue_lookup_failure_emits_single_failure() {
    let source = Arc::new(MockStatusSource::new().fail_at(FailAt::QueueLookup));
    let updates = collect(spawn_run(
        source,
        "test".to_string(),
        JobArgs::new(),
        RunSettings::default(),
    ))
    .await;

    assert_eq!(updates.len(), 1);
    assert!(updates[0].is_failure());
    assert!(updates[0].message.starts_with("Task get error:"));
}

#[tokio::test(start_paused = true)]
async fn test_queue_poll_failure_after_queued() {
    let source = Arc::new(
        MockStatusSource::new()
            .queue_polls(2)
            .fail_at(FailAt::QueuePoll),
    );
    let updates = collect(spawn_run(
        source,
        "test".to_string(),
        JobArgs::new(),
        RunSettings::default(),
    ))
    .await;

    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0], LifecycleUpdate::queued("test"));
    assert!(updates[1].is_failure());
    assert!(updates[1].message.starts_with("Error polling queue:"));
}

#[tokio::test(start_paused = true)]
async fn test_build_poll_failure_after_running() {
    let source = Arc::new(
        MockStatusSource::new()
            .build_polls(1)
            .fail_at(FailAt::BuildPoll),
    );
    let updates = collect(spawn_run(
        source,
        "test".to_string(),
        JobArgs::new(),
        RunSettings::default(),
    ))
    .await;

    let reactions: Vec<&str> = updates.iter().map(|u| u.reaction.as_str()).collect();
    assert_eq!(reactions, vec!["stopwatch", "gear", "boom"]);
    assert!(updates[2].message.starts_with("Error polling build:"));
}

#[tokio::test(start_paused = true)]
async fn test_build_lookup_failure() {
    let source = Arc::new(MockStatusSource::new().fail_at(FailAt::BuildLookup));
    let updates = collect(spawn_run(
        source,
        "test".to_string(),
        JobArgs::new(),
        RunSettings::default(),
    ))
    .await;

    assert_eq!(updates.len(), 2);
    assert!(updates[1].message.starts_with("Queue item get error:"));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_ends_a_stuck_build() {
    let source = Arc::new(MockStatusSource::new().build_polls(usize::MAX));
    let settings = RunSettings {
        poll_interval: Duration::from_millis(100),
        deadline: Some(Duration::from_secs(5)),
    };
    let updates = collect(spawn_run(
        source,
        "slow".to_string(),
        JobArgs::new(),
        settings,
    ))
    .await;

    assert_eq!(updates.len(), 3);
    assert!(updates[2].is_failure());
    assert_eq!(updates[2].message, "Job `slow` timed out after 5s");
}

#[tokio::test(start_paused = true)]
async fn test_remote_job_runs_through_source() {
    let source = Arc::new(MockStatusSource::new().base_url("http://ci"));
    let job = RemoteJob::new(
        JobDetails::new("nightly", "Nightly build"),
        source,
        RunSettings::default(),
    );
    assert_eq!(job.name(), "nightly");
    assert_eq!(job.description(), "Nightly build");
    assert_eq!(job.describe(), "`nightly`: Nightly build\nParameters:\n");

    let updates = collect(job.run(JobArgs::new())).await;
    assert_eq!(updates.len(), 3);
    assert!(updates[1].message.contains("(http://ci/job/nightly/1/)"));
}

#[tokio::test(start_paused = true)]
async fn test_same_job_can_run_concurrently() {
    let source = Arc::new(MockStatusSource::new());
    let job = RemoteJob::new(
        JobDetails::new("test", ""),
        source,
        RunSettings::default(),
    );
    let first = job.run(JobArgs::new());
    let second = job.run(JobArgs::new());
    let (a, b) = tokio::join!(collect(first), collect(second));
    assert_eq!(a.len(), 3);
    assert_eq!(b.len(), 3);
}
