// ABOUTME: Normalized inbound message with reply and reaction helpers.
// ABOUTME: Sender and conversation are resolved once at read time and cached on the value.

use crate::event::MessageEvent;
use crate::traits::{ChatApi, ChatUser, Conversation};
use anyhow::{bail, Result};
use std::sync::Arc;

/// Everything a message needs from the dispatcher to normalize itself and talk back
#[derive(Clone)]
pub struct ChatContext {
    pub api: Arc<dyn ChatApi>,
    /// The bot's own user ID, empty until the transport has connected
    pub bot_id: String,
    /// Thread every reply under the triggering message
    pub reply_in_thread: bool,
}

impl std::fmt::Debug for ChatContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatContext")
            .field("bot_id", &self.bot_id)
            .field("reply_in_thread", &self.reply_in_thread)
            .finish_non_exhaustive()
    }
}

/// Mention token the transport embeds in text, e.g. `<@U0BOT>`
pub fn mention_token(bot_id: &str) -> String {
    format!("<@{}>", bot_id)
}

/// An inbound message, normalized.
///
/// A message is *complete* only when the event carried a stable client
/// message ID. Incomplete messages are transport echoes and never trigger
/// processors; reacting to them is an error.
#[derive(Clone)]
pub struct Message {
    event: MessageEvent,
    ctx: ChatContext,
    completed: bool,
    mention: bool,
    user: Option<ChatUser>,
    conversation: Option<Conversation>,
    text: String,
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("channel", &self.event.channel)
            .field("ts", &self.event.ts)
            .field("completed", &self.completed)
            .field("thread", &self.is_thread())
            .field("mention", &self.mention)
            .field("user", &self.user)
            .field("conversation", &self.conversation)
            .field("text", &self.text)
            .finish()
    }
}

impl Message {
    /// Normalize `event`. Lookups only happen for complete messages; a failed
    /// lookup is an error and the message is dropped by the caller.
    pub async fn read(event: MessageEvent, ctx: ChatContext) -> Result<Self> {
        if !event.has_stable_id() {
            return Ok(Self {
                event,
                ctx,
                completed: false,
                mention: false,
                user: None,
                conversation: None,
                text: String::new(),
            });
        }

        let token = mention_token(&ctx.bot_id);
        let mention = !ctx.bot_id.is_empty() && event.text.contains(&token);

        let mut text = event.text.clone();
        if mention {
            text = text.replace(&token, "");
        }
        let text = text.replace('\u{a0}', " ").trim().to_string();

        let user = ctx.api.user_info(&event.user).await?;
        let conversation = ctx.api.conversation_info(&event.channel).await?;

        Ok(Self {
            event,
            ctx,
            completed: true,
            mention,
            user: Some(ChatUser::from(user)),
            conversation: Some(Conversation::from(conversation)),
            text,
        })
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Whether the message was posted inside an existing thread
    pub fn is_thread(&self) -> bool {
        self.event.in_thread()
    }

    /// Whether the bot was mentioned
    pub fn is_mention(&self) -> bool {
        self.mention
    }

    /// Cleaned text: mention token removed, non-breaking spaces normalized, trimmed
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn user(&self) -> Option<&ChatUser> {
        self.user.as_ref()
    }

    pub fn conversation(&self) -> Option<&Conversation> {
        self.conversation.as_ref()
    }

    pub fn channel_id(&self) -> &str {
        &self.event.channel
    }

    pub fn timestamp(&self) -> &str {
        &self.event.ts
    }

    pub fn event(&self) -> &MessageEvent {
        &self.event
    }

    /// Where a reply lands: the existing thread root if the message is in a
    /// thread, the message itself when threading is requested, else top level.
    fn reply_anchor(&self, in_thread: bool) -> Option<&str> {
        if self.is_thread() {
            return self.event.thread_ts.as_deref();
        }
        if in_thread || self.ctx.reply_in_thread {
            return Some(self.event.ts.as_str());
        }
        None
    }

    /// Post `text` in the originating conversation
    pub async fn reply(&self, text: &str, in_thread: bool) -> Result<()> {
        let anchor = self.reply_anchor(in_thread);
        self.ctx
            .api
            .send_reply(&self.event.channel, text, anchor)
            .await
    }

    /// Add reaction `name` to this message
    pub async fn react(&self, name: &str) -> Result<()> {
        if !self.completed {
            bail!("Cannot react to an incomplete message");
        }
        self.ctx
            .api
            .add_reaction(name, &self.event.channel, &self.event.ts)
            .await
    }

    /// Remove reaction `name` from this message
    pub async fn unreact(&self, name: &str) -> Result<()> {
        if !self.completed {
            bail!("Cannot remove a reaction from an incomplete message");
        }
        self.ctx
            .api
            .remove_reaction(name, &self.event.channel, &self.event.ts)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ChatCall, MockChat};

    fn event(text: &str) -> MessageEvent {
        MessageEvent {
            client_msg_id: Some("m-1".to_string()),
            thread_ts: None,
            user: "U1".to_string(),
            channel: "C1".to_string(),
            text: text.to_string(),
            ts: "100.1".to_string(),
        }
    }

    fn ctx(chat: &Arc<MockChat>, reply_in_thread: bool) -> ChatContext {
        ChatContext {
            api: chat.clone(),
            bot_id: "U0BOT".to_string(),
            reply_in_thread,
        }
    }

    #[tokio::test]
    async fn test_read_strips_mention_and_nbsp() {
        let chat = Arc::new(MockChat::new());
        let msg = Message::read(event("<@U0BOT>\u{a0}build  deploy "), ctx(&chat, false))
            .await
            .unwrap();

        assert!(msg.is_completed());
        assert!(msg.is_mention());
        assert!(!msg.is_thread());
        assert_eq!(msg.text(), "build  deploy");
        assert_eq!(msg.user().map(|u| u.name.as_str()), Some("@user-U1"));
        assert_eq!(msg.conversation().map(|c| c.name.as_str()), Some("#chan-C1"));
    }

    #[tokio::test]
    async fn test_read_without_mention_keeps_text() {
        let chat = Arc::new(MockChat::new());
        let msg = Message::read(event("  list "), ctx(&chat, false)).await.unwrap();
        assert!(!msg.is_mention());
        assert_eq!(msg.text(), "list");
    }

    #[tokio::test]
    async fn test_incomplete_message_skips_lookups_and_rejects_reactions() {
        let chat = Arc::new(MockChat::new());
        let mut raw = event("echo");
        raw.client_msg_id = None;
        let msg = Message::read(raw, ctx(&chat, false)).await.unwrap();

        assert!(!msg.is_completed());
        assert!(msg.user().is_none());
        assert!(chat.calls().is_empty());
        assert!(msg.react("+1").await.is_err());
        assert!(msg.unreact("+1").await.is_err());
    }

    #[tokio::test]
    async fn test_lookup_failure_is_an_error() {
        let chat = Arc::new(MockChat::new().fail_lookups());
        assert!(Message::read(event("hi"), ctx(&chat, false)).await.is_err());
    }

    #[tokio::test]
    async fn test_incomplete_message_leaves_fields_empty() {
        let chat = Arc::new(MockChat::new());
        let mut raw = event("<@U0BOT> build deploy");
        raw.client_msg_id = None;
        let msg = Message::read(raw, ctx(&chat, false)).await.unwrap();

        assert!(!msg.is_mention());
        assert_eq!(msg.text(), "");
        assert!(msg.conversation().is_none());
    }

    #[tokio::test]
    async fn test_reply_anchoring() {
        let chat = Arc::new(MockChat::new());
        let msg = Message::read(event("hi"), ctx(&chat, false)).await.unwrap();
        msg.reply("top", false).await.unwrap();
        msg.reply("threaded", true).await.unwrap();

        let mut in_thread = event("hi");
        in_thread.thread_ts = Some("50.0".to_string());
        let threaded = Message::read(in_thread, ctx(&chat, false)).await.unwrap();
        threaded.reply("follow-up", false).await.unwrap();

        let always = Message::read(event("hi"), ctx(&chat, true)).await.unwrap();
        always.reply("forced", false).await.unwrap();

        assert_eq!(
            chat.replies(),
            vec![
                ("C1".to_string(), "top".to_string(), None),
                ("C1".to_string(), "threaded".to_string(), Some("100.1".to_string())),
                ("C1".to_string(), "follow-up".to_string(), Some("50.0".to_string())),
                ("C1".to_string(), "forced".to_string(), Some("100.1".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn test_react_and_unreact_target_the_message() {
        let chat = Arc::new(MockChat::new());
        let msg = Message::read(event("hi"), ctx(&chat, false)).await.unwrap();
        msg.react("gear").await.unwrap();
        msg.unreact("gear").await.unwrap();

        let reactions: Vec<ChatCall> = chat
            .calls()
            .into_iter()
            .filter(|c| matches!(c, ChatCall::React { .. } | ChatCall::Unreact { .. }))
            .collect();
        assert_eq!(
            reactions,
            vec![
                ChatCall::React {
                    name: "gear".to_string(),
                    channel: "C1".to_string(),
                    ts: "100.1".to_string()
                },
                ChatCall::Unreact {
                    name: "gear".to_string(),
                    channel: "C1".to_string(),
                    ts: "100.1".to_string()
                },
            ]
        );
    }
}
