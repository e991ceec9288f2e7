// ABOUTME: Backend configuration for relay-jobs.
// ABOUTME: Typed [jobs] section: backend selector, remote URL/credentials, polling knobs.

use crate::runner::{RunSettings, DEFAULT_POLL_INTERVAL};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// `[jobs]` configuration section
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendConfig {
    /// Backend type: "jenkins" or "mock"
    #[serde(rename = "backend", default = "default_backend")]
    pub backend_type: String,
    /// Base URL of the build system
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Per-build deadline; unset waits forever
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_timeout_secs: Option<u64>,
    /// Job name -> description, used by the mock backend
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mock_jobs: BTreeMap<String, String>,
}

// Custom Debug impl to redact the password
impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("backend_type", &self.backend_type)
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("build_timeout_secs", &self.build_timeout_secs)
            .field("mock_jobs", &self.mock_jobs)
            .finish()
    }
}

fn default_backend() -> String {
    "jenkins".to_string()
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            backend_type: default_backend(),
            url: None,
            user: None,
            password: None,
            poll_interval_ms: default_poll_interval_ms(),
            build_timeout_secs: None,
            mock_jobs: BTreeMap::new(),
        }
    }
}

impl BackendConfig {
    pub fn backend_type(&self) -> &str {
        &self.backend_type
    }

    /// Base URL without a trailing slash, or empty if unset
    pub fn base_url(&self) -> &str {
        self.url.as_deref().unwrap_or("").trim_end_matches('/')
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            deadline: self.build_timeout_secs.map(Duration::from_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BackendConfig::default();
        assert_eq!(config.backend_type(), "jenkins");
        assert_eq!(config.poll_interval_ms, 100);
        assert_eq!(config.run_settings(), RunSettings::default());
    }

    #[test]
    fn test_base_url_trims_trailing_slash() {
        let config = BackendConfig {
            url: Some("https://ci.example.com/".to_string()),
            ..Default::default()
        };
        assert_eq!(config.base_url(), "https://ci.example.com");
    }

    #[test]
    fn test_run_settings_with_deadline() {
        let config = BackendConfig {
            poll_interval_ms: 5,
            build_timeout_secs: Some(30),
            ..Default::default()
        };
        let settings = config.run_settings();
        assert_eq!(settings.poll_interval, Duration::from_millis(5));
        assert_eq!(settings.deadline, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = BackendConfig {
            password: Some("hunter2".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }
}
