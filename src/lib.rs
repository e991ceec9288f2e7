// ABOUTME: Root library module for the relay binary.
// ABOUTME: CLI, logging, start-up wiring and the Slack transport.

pub mod app;
pub mod cli;
pub mod logging;
pub mod platform;

// Re-export the workspace crates for convenience
pub use relay_core::config;
pub use relay_jobs;
