// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Validates required fields at start time and redacts secrets in Debug output
use anyhow::{Context, Result};
use relay_jobs::BackendConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File picked up from the working directory when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "relay.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub jobs: BackendConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

// ─── SlackConfig ────────────────────────────────────────────────

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Bot token (xoxb-...)
    #[serde(default)]
    pub bot_token: String,
    /// App-level token for Socket Mode (xapp-...)
    #[serde(default)]
    pub app_token: String,
    /// Thread every reply under the triggering message
    #[serde(default)]
    pub reply_in_thread: bool,
}

// Custom Debug impl to redact bot_token and app_token
impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &redact(&self.bot_token))
            .field("app_token", &redact(&self.app_token))
            .field("reply_in_thread", &self.reply_in_thread)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "[REDACTED]"
    }
}

// ─── DispatchConfig ─────────────────────────────────────────────

/// How processors matching one message are run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// All processors run concurrently; dispatch waits for all of them
    #[default]
    Concurrent,
    /// Processors run one after another in registration order
    Sequential,
}

impl std::str::FromStr for DispatchMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "concurrent" => Ok(DispatchMode::Concurrent),
            "sequential" => Ok(DispatchMode::Sequential),
            other => anyhow::bail!(
                "Invalid dispatch mode '{}'. Use 'concurrent' or 'sequential'",
                other
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub mode: DispatchMode,
}

// ─── Loading ────────────────────────────────────────────────────

impl Config {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse configuration")
    }

    /// Load configuration from `path` (or `./relay.toml` if present) and apply
    /// environment variable overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match Self::find_config_file(path)? {
            Some(config_path) => {
                tracing::info!(path = %config_path.display(), "Loading configuration from file");
                let content = std::fs::read_to_string(&config_path)
                    .with_context(|| format!("Failed to read {}", config_path.display()))?;
                toml::from_str::<Config>(&content)
                    .with_context(|| format!("Failed to parse {}", config_path.display()))?
            }
            None => {
                tracing::info!("No config file found, using environment variables and defaults");
                Config::default()
            }
        };

        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn find_config_file(path: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = path {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            return Ok(Some(path.to_path_buf()));
        }
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        Ok(local.exists().then_some(local))
    }

    /// Apply overrides from `lookup` (normally the process environment)
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("SLACK_BOT_TOKEN") {
            self.slack.bot_token = val;
        }
        if let Some(val) = lookup("SLACK_APP_TOKEN") {
            self.slack.app_token = val;
        }
        if let Some(val) = lookup("SLACK_REPLY_IN_THREAD") {
            self.slack.reply_in_thread = parse_bool(&val).with_context(|| {
                format!("SLACK_REPLY_IN_THREAD must be true or false, got: {}", val)
            })?;
        }
        if let Some(val) = lookup("JOBS_BACKEND") {
            self.jobs.backend_type = val;
        }
        if let Some(val) = lookup("JENKINS_URL") {
            self.jobs.url = Some(val);
        }
        if let Some(val) = lookup("JENKINS_USER") {
            self.jobs.user = Some(val);
        }
        if let Some(val) = lookup("JENKINS_PASSWORD") {
            self.jobs.password = Some(val);
        }
        if let Some(val) = lookup("JOBS_POLL_INTERVAL_MS") {
            self.jobs.poll_interval_ms = val.parse().with_context(|| {
                format!("JOBS_POLL_INTERVAL_MS must be a valid number, got: {}", val)
            })?;
        }
        if let Some(val) = lookup("JOBS_BUILD_TIMEOUT_SECS") {
            self.jobs.build_timeout_secs = Some(val.parse().with_context(|| {
                format!("JOBS_BUILD_TIMEOUT_SECS must be a valid number, got: {}", val)
            })?);
        }
        if let Some(val) = lookup("DISPATCH_MODE") {
            self.dispatch.mode = val.parse()?;
        }
        Ok(())
    }

    /// Check the fields needed to connect to the chat transport
    pub fn validate_for_start(&self) -> Result<()> {
        if self.slack.bot_token.trim().is_empty() {
            anyhow::bail!(
                "slack.bot_token is required (set in relay.toml or SLACK_BOT_TOKEN env var)"
            );
        }
        if self.slack.app_token.trim().is_empty() {
            anyhow::bail!(
                "slack.app_token is required (set in relay.toml or SLACK_APP_TOKEN env var)"
            );
        }
        if self.jobs.poll_interval_ms == 0 {
            anyhow::bail!("jobs.poll_interval_ms must be greater than zero");
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("not a boolean"),
    }
}
