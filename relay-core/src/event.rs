// ABOUTME: Inbound transport events consumed by the dispatch loop.
// ABOUTME: Only Message carries payload for processors; the rest are connection lifecycle.

use std::time::Duration;

/// A "message posted" notification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageEvent {
    /// Client-assigned message ID; missing or empty for transport echoes
    pub client_msg_id: Option<String>,
    /// Root timestamp of the thread this message belongs to
    pub thread_ts: Option<String>,
    /// Sender user ID
    pub user: String,
    /// Conversation ID
    pub channel: String,
    /// Raw message text
    pub text: String,
    /// Timestamp of this message
    pub ts: String,
}

impl MessageEvent {
    /// Whether the event carries a stable client message ID
    pub fn has_stable_id(&self) -> bool {
        self.client_msg_id
            .as_deref()
            .map(|id| !id.is_empty())
            .unwrap_or(false)
    }

    /// Whether the event belongs to an existing thread
    pub fn in_thread(&self) -> bool {
        self.thread_ts
            .as_deref()
            .map(|ts| !ts.is_empty())
            .unwrap_or(false)
    }
}

/// Tagged union of everything the transport can report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A message was posted
    Message(MessageEvent),
    /// A connection attempt is starting
    Connecting { attempt: u32, connection_count: u32 },
    /// Connection confirmed; carries the bot's own identity
    Connected {
        bot_id: String,
        bot_name: String,
        team: String,
        connection_count: u32,
    },
    /// Credentials were rejected
    InvalidAuth,
    ConnectionError { reason: String },
    Disconnected { reason: String },
    /// Error receiving an inbound event
    IncomingError { reason: String },
    MessageTooLong,
    /// Error sending an outbound message
    OutgoingError { reason: String },
    RateLimited { retry_after: Duration },
    UnmarshallingError { reason: String },
    /// Any event type the relay does not act on
    Other { kind: String },
}

impl ChatEvent {
    /// Short type tag for logging
    pub fn kind(&self) -> &str {
        match self {
            ChatEvent::Message(_) => "message",
            ChatEvent::Connecting { .. } => "connecting",
            ChatEvent::Connected { .. } => "connected",
            ChatEvent::InvalidAuth => "invalid_auth",
            ChatEvent::ConnectionError { .. } => "connection_error",
            ChatEvent::Disconnected { .. } => "disconnected",
            ChatEvent::IncomingError { .. } => "incoming_error",
            ChatEvent::MessageTooLong => "message_too_long",
            ChatEvent::OutgoingError { .. } => "outgoing_error",
            ChatEvent::RateLimited { .. } => "rate_limited",
            ChatEvent::UnmarshallingError { .. } => "unmarshalling_error",
            ChatEvent::Other { kind } => kind,
        }
    }
}
