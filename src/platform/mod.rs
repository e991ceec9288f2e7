// ABOUTME: Chat transport implementations.
// ABOUTME: Slack is the only transport; others plug in through relay_core::ChatPlatform.

pub mod slack;

pub use slack::SlackPlatform;
