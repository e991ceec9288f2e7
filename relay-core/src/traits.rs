// ABOUTME: Core traits for the chat transport abstraction
// ABOUTME: ChatApi (lookups, replies, reactions) and ChatPlatform (inbound event stream)

use crate::event::ChatEvent;
use anyhow::Result;
use async_trait::async_trait;
use std::pin::Pin;
use tokio_stream::Stream;

// =============================================================================
// Identity Types
// =============================================================================

/// Raw user record returned by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub id: String,
    /// Handle without the leading `@`
    pub name: String,
}

/// Sender of a message, resolved once at read time
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChatUser {
    /// Transport identifier (e.g., U12345678)
    pub id: String,
    /// Display name, `@handle`
    pub name: String,
}

impl From<UserInfo> for ChatUser {
    fn from(info: UserInfo) -> Self {
        Self {
            id: info.id,
            name: format!("@{}", info.name),
        }
    }
}

/// What kind of conversation a message was posted in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationKind {
    /// Public or private channel
    Channel,
    /// 1:1 direct message
    DirectMessage,
    /// Multi-party group conversation
    Group,
}

/// Raw conversation record returned by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationInfo {
    pub id: String,
    pub name: String,
    /// Channel purpose, empty if unset
    pub purpose: String,
    pub kind: ConversationKind,
}

/// Originating conversation of a message, resolved once at read time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: String,
    /// `#name` (or its purpose) for channels, `DM` for direct messages,
    /// the purpose for groups
    pub name: String,
    pub kind: ConversationKind,
}

impl From<ConversationInfo> for Conversation {
    fn from(info: ConversationInfo) -> Self {
        let name = match info.kind {
            ConversationKind::Channel if !info.purpose.is_empty() => info.purpose,
            ConversationKind::Channel => format!("#{}", info.name),
            ConversationKind::DirectMessage => "DM".to_string(),
            ConversationKind::Group => info.purpose,
        };
        Self {
            id: info.id,
            name,
            kind: info.kind,
        }
    }
}

// =============================================================================
// Transport Capabilities
// =============================================================================

/// Boxed stream type for inbound transport events
pub type EventStream = Pin<Box<dyn Stream<Item = ChatEvent> + Send>>;

/// Outgoing side of the chat transport plus the read-only lookups needed to
/// normalize inbound messages.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Resolve a user ID to its record
    async fn user_info(&self, user_id: &str) -> Result<UserInfo>;

    /// Resolve a channel/DM/group ID to its record
    async fn conversation_info(&self, channel_id: &str) -> Result<ConversationInfo>;

    /// Post `text` to `channel_id`, threaded under `thread_ts` if given
    async fn send_reply(&self, channel_id: &str, text: &str, thread_ts: Option<&str>)
        -> Result<()>;

    /// Add reaction `name` to the message at `channel_id`/`ts`
    async fn add_reaction(&self, name: &str, channel_id: &str, ts: &str) -> Result<()>;

    /// Remove reaction `name` from the message at `channel_id`/`ts`
    async fn remove_reaction(&self, name: &str, channel_id: &str, ts: &str) -> Result<()>;
}

/// A connected chat platform: a source of inbound events and a sink for
/// replies and reactions.
#[async_trait]
pub trait ChatPlatform: ChatApi {
    /// Receive inbound events as a stream
    async fn event_stream(&self) -> Result<EventStream>;

    /// Platform identifier (e.g., "slack")
    fn platform_id(&self) -> &'static str;

    /// Gracefully shut down the platform connection
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
