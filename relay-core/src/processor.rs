// ABOUTME: Named message processors and the registry that fans messages out to them.
// ABOUTME: Duplicate names are rejected; dispatch waits for every processor and contains panics.

use crate::config::DispatchMode;
use crate::filters::SharedAction;
use crate::message::Message;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use thiserror::Error;
use tokio::task::JoinSet;

/// Structured processor identifier, displayed as `namespace/name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessorName {
    pub namespace: String,
    pub name: String,
}

impl ProcessorName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ProcessorName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("A processor named `{0}` is already registered")]
    DuplicateName(ProcessorName),
}

/// A named reaction to inbound messages
#[derive(Clone)]
pub struct Processor {
    name: ProcessorName,
    action: SharedAction,
}

impl Processor {
    pub fn new(name: ProcessorName, action: SharedAction) -> Self {
        Self { name, action }
    }

    pub fn name(&self) -> &ProcessorName {
        &self.name
    }

    async fn run(self, msg: Message) {
        tracing::debug!(processor = %self.name, "Running processor");
        let outcome = AssertUnwindSafe(self.action.call(msg)).catch_unwind().await;
        if outcome.is_err() {
            tracing::error!(processor = %self.name, "Processor panicked");
        }
    }
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Ordered, name-unique processor collection
#[derive(Debug, Default)]
pub struct ProcessorRegistry {
    processors: Vec<Processor>,
    mode: DispatchMode,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: DispatchMode) -> Self {
        Self {
            processors: Vec::new(),
            mode,
        }
    }

    /// Add a processor. An existing processor with the same name is kept and
    /// the new one rejected.
    pub fn register(&mut self, name: ProcessorName, action: SharedAction) -> Result<(), RegistryError> {
        if self.processors.iter().any(|p| p.name == name) {
            return Err(RegistryError::DuplicateName(name));
        }
        tracing::info!(processor = %name, "Registered processor");
        self.processors.push(Processor::new(name, action));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn names(&self) -> Vec<ProcessorName> {
        self.processors.iter().map(|p| p.name.clone()).collect()
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Run every processor against `msg` and return once all have finished.
    ///
    /// Each processor gets its own clone of the message. A panicking
    /// processor is logged and does not affect the others.
    pub async fn dispatch(&self, msg: &Message) {
        match self.mode {
            DispatchMode::Concurrent => {
                let mut tasks = JoinSet::new();
                for processor in &self.processors {
                    tasks.spawn(processor.clone().run(msg.clone()));
                }
                while let Some(joined) = tasks.join_next().await {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "Processor task failed");
                    }
                }
            }
            DispatchMode::Sequential => {
                for processor in &self.processors {
                    processor.clone().run(msg.clone()).await;
                }
            }
        }
    }
}
