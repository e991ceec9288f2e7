// ABOUTME: Job catalog: ordered, name-unique collection of jobs.
// ABOUTME: Shared behind an RwLock so reloads never expose a half-rebuilt catalog.

use crate::traits::{Job, JobServer};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Catalog shared between the job-control processors
pub type SharedCatalog = Arc<RwLock<JobCatalog>>;

/// Ordered collection of jobs, unique by name.
///
/// Lookup is linear; catalogs hold tens to low hundreds of jobs.
#[derive(Default, Clone)]
pub struct JobCatalog {
    jobs: Vec<Arc<dyn Job>>,
}

impl JobCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap this catalog for sharing
    pub fn shared(self) -> SharedCatalog {
        Arc::new(RwLock::new(self))
    }

    /// Add a job. A job with an already-present name replaces the old entry
    /// in place, keeping `len()` equal to the number of distinct names.
    pub fn add(&mut self, job: Arc<dyn Job>) {
        match self.jobs.iter().position(|j| j.name() == job.name()) {
            Some(index) => {
                tracing::debug!(job = %job.name(), "Replacing job with duplicate name");
                self.jobs[index] = job;
            }
            None => self.jobs.push(job),
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Job>> {
        self.jobs.iter().find(|j| j.name() == name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.jobs.iter().any(|j| j.name() == name)
    }

    /// Job names in insertion order
    pub fn names(&self) -> Vec<String> {
        self.jobs.iter().map(|j| j.name().to_string()).collect()
    }

    /// One job name per line, each line newline-terminated
    pub fn list(&self) -> String {
        self.jobs
            .iter()
            .map(|j| format!("{}\n", j.name()))
            .collect()
    }

    /// Add every job `server` reports
    pub async fn load(&mut self, server: &dyn JobServer) -> Result<usize> {
        let jobs = server.load().await?;
        for job in jobs {
            self.add(job);
        }
        tracing::info!(backend = server.name(), jobs = self.len(), "Loaded jobs");
        Ok(self.len())
    }
}

impl std::fmt::Debug for JobCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobCatalog")
            .field("jobs", &self.names())
            .finish()
    }
}

/// Clear and rebuild the shared catalog from `server`.
///
/// Holds the write lock for the whole rebuild. On failure the catalog keeps
/// whatever the failed load left behind, which may be empty.
pub async fn reload(catalog: &SharedCatalog, server: &dyn JobServer) -> Result<usize> {
    let mut guard = catalog.write().await;
    guard.clear();
    guard.load(server).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::mock::MockJob;

    fn job(name: &str) -> Arc<dyn Job> {
        Arc::new(MockJob::new(name, format!("{} job", name), "http://ci"))
    }

    #[test]
    fn test_add_and_lookup() {
        let mut catalog = JobCatalog::new();
        catalog.add(job("deploy"));
        catalog.add(job("test"));

        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains("deploy"));
        assert_eq!(catalog.get("test").map(|j| j.name().to_string()), Some("test".to_string()));
        assert!(catalog.get("ghost").is_none());
    }

    #[test]
    fn test_duplicate_names_keep_len_distinct() {
        let mut catalog = JobCatalog::new();
        catalog.add(job("deploy"));
        catalog.add(Arc::new(MockJob::new("deploy", "newer", "http://ci")));

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("deploy").map(|j| j.description().to_string()), Some("newer".to_string()));
    }

    #[test]
    fn test_list_preserves_order() {
        let mut catalog = JobCatalog::new();
        catalog.add(job("b"));
        catalog.add(job("a"));
        assert_eq!(catalog.list(), "b\na\n");
        assert_eq!(catalog.names(), vec!["b", "a"]);
    }

    #[test]
    fn test_clear() {
        let mut catalog = JobCatalog::new();
        catalog.add(job("a"));
        catalog.clear();
        assert!(catalog.is_empty());
        assert_eq!(catalog.list(), "");
    }
}
