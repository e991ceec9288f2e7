// ABOUTME: In-memory chat double that records every call for assertions.
// ABOUTME: Also serves a scripted event stream so the dispatch loop can run without a network.

use crate::event::ChatEvent;
use crate::traits::{
    ChatApi, ChatPlatform, ConversationInfo, ConversationKind, EventStream, UserInfo,
};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Mutex;

/// A call made against the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCall {
    UserInfo(String),
    ConversationInfo(String),
    Reply {
        channel: String,
        text: String,
        thread_ts: Option<String>,
    },
    React {
        name: String,
        channel: String,
        ts: String,
    },
    Unreact {
        name: String,
        channel: String,
        ts: String,
    },
}

/// Chat double: users resolve to `user-{id}`, conversations to channels named
/// `chan-{id}`.
#[derive(Debug, Default)]
pub struct MockChat {
    calls: Mutex<Vec<ChatCall>>,
    events: Mutex<Vec<ChatEvent>>,
    fail_lookups: bool,
    fail_sends: bool,
}

impl MockChat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `events` from `event_stream`
    pub fn with_events(self, events: Vec<ChatEvent>) -> Self {
        *self.events.lock().unwrap_or_else(|e| e.into_inner()) = events;
        self
    }

    /// Make user and conversation lookups fail
    pub fn fail_lookups(mut self) -> Self {
        self.fail_lookups = true;
        self
    }

    /// Make replies and reactions fail (they are still recorded)
    pub fn fail_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    fn record(&self, call: ChatCall) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }

    fn send_result(&self) -> Result<()> {
        if self.fail_sends {
            bail!("mock send failure");
        }
        Ok(())
    }

    /// Every call so far, in order
    pub fn calls(&self) -> Vec<ChatCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// `(channel, text, thread_ts)` for every reply
    pub fn replies(&self) -> Vec<(String, String, Option<String>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ChatCall::Reply {
                    channel,
                    text,
                    thread_ts,
                } => Some((channel, text, thread_ts)),
                _ => None,
            })
            .collect()
    }

    /// Reply texts only
    pub fn reply_texts(&self) -> Vec<String> {
        self.replies().into_iter().map(|(_, text, _)| text).collect()
    }

    /// Reaction changes as `+name` / `-name`
    pub fn reaction_log(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ChatCall::React { name, .. } => Some(format!("+{}", name)),
                ChatCall::Unreact { name, .. } => Some(format!("-{}", name)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ChatApi for MockChat {
    async fn user_info(&self, user_id: &str) -> Result<UserInfo> {
        self.record(ChatCall::UserInfo(user_id.to_string()));
        if self.fail_lookups {
            bail!("user_not_found");
        }
        Ok(UserInfo {
            id: user_id.to_string(),
            name: format!("user-{}", user_id),
        })
    }

    async fn conversation_info(&self, channel_id: &str) -> Result<ConversationInfo> {
        self.record(ChatCall::ConversationInfo(channel_id.to_string()));
        if self.fail_lookups {
            bail!("channel_not_found");
        }
        Ok(ConversationInfo {
            id: channel_id.to_string(),
            name: format!("chan-{}", channel_id),
            purpose: String::new(),
            kind: ConversationKind::Channel,
        })
    }

    async fn send_reply(
        &self,
        channel_id: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<()> {
        self.record(ChatCall::Reply {
            channel: channel_id.to_string(),
            text: text.to_string(),
            thread_ts: thread_ts.map(str::to_string),
        });
        self.send_result()
    }

    async fn add_reaction(&self, name: &str, channel_id: &str, ts: &str) -> Result<()> {
        self.record(ChatCall::React {
            name: name.to_string(),
            channel: channel_id.to_string(),
            ts: ts.to_string(),
        });
        self.send_result()
    }

    async fn remove_reaction(&self, name: &str, channel_id: &str, ts: &str) -> Result<()> {
        self.record(ChatCall::Unreact {
            name: name.to_string(),
            channel: channel_id.to_string(),
            ts: ts.to_string(),
        });
        self.send_result()
    }
}

#[async_trait]
impl ChatPlatform for MockChat {
    async fn event_stream(&self) -> Result<EventStream> {
        let events = std::mem::take(&mut *self.events.lock().unwrap_or_else(|e| e.into_inner()));
        Ok(Box::pin(tokio_stream::iter(events)))
    }

    fn platform_id(&self) -> &'static str {
        "mock"
    }
}
