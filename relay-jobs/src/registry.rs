// ABOUTME: Registry pattern for runtime job backend selection.
// ABOUTME: Backends register factories, relay creates the configured one by name.

use crate::config::BackendConfig;
use crate::traits::JobServer;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Factory function that creates a JobServer from config
pub type ServerFactory = Box<dyn Fn(&BackendConfig) -> Result<Arc<dyn JobServer>> + Send + Sync>;

/// Registry for runtime backend selection
pub struct BackendRegistry {
    factories: HashMap<String, ServerFactory>,
}

impl BackendRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a backend factory by name
    pub fn register<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(&BackendConfig) -> Result<Arc<dyn JobServer>> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
        self
    }

    /// Create a backend by name with the given config
    pub fn create(&self, name: &str, config: &BackendConfig) -> Result<Arc<dyn JobServer>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| anyhow!("Unknown job backend: {}", name))?;
        factory(config)
    }

    /// Create the backend selected by `config.backend_type`
    pub fn create_from_config(&self, config: &BackendConfig) -> Result<Arc<dyn JobServer>> {
        self.create(config.backend_type(), config)
    }

    /// List available backend names, sorted
    pub fn available(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        use crate::backends::jenkins::JenkinsServer;
        use crate::backends::mock::MockJobServer;

        Self::new()
            .register("mock", MockJobServer::factory())
            .register("jenkins", JenkinsServer::factory())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backends() {
        let registry = BackendRegistry::default();
        assert_eq!(registry.available(), vec!["jenkins", "mock"]);
    }

    #[test]
    fn test_unknown_backend() {
        let registry = BackendRegistry::default();
        let err = registry
            .create("bamboo", &BackendConfig::default())
            .err()
            .map(|e| e.to_string());
        assert_eq!(err.as_deref(), Some("Unknown job backend: bamboo"));
    }

    #[test]
    fn test_create_mock_from_config() {
        let registry = BackendRegistry::default();
        let config = BackendConfig {
            backend_type: "mock".to_string(),
            ..Default::default()
        };
        let server = registry.create_from_config(&config).unwrap();
        assert_eq!(server.name(), "mock");
    }
}
