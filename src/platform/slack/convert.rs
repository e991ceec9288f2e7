// ABOUTME: Conversions between slack-morphism models and relay chat types.
// ABOUTME: Kept free of network calls so they can be tested without a workspace.

use relay_core::{ConversationInfo, ConversationKind, MessageEvent, UserInfo};
use slack_morphism::prelude::*;

/// Map a `conversations.info` channel to a conversation record
pub fn conversation_info(channel: &SlackChannelInfo) -> ConversationInfo {
    ConversationInfo {
        id: channel.id.to_string(),
        name: channel.name.clone().unwrap_or_default(),
        purpose: channel
            .purpose
            .as_ref()
            .map(|p| p.value.clone())
            .unwrap_or_default(),
        kind: conversation_kind(channel.flags.is_im, channel.flags.is_mpim),
    }
}

/// DMs are `im`, multi-party DMs are `mpim`, everything else is a channel
pub fn conversation_kind(is_im: Option<bool>, is_mpim: Option<bool>) -> ConversationKind {
    if is_im.unwrap_or(false) {
        ConversationKind::DirectMessage
    } else if is_mpim.unwrap_or(false) {
        ConversationKind::Group
    } else {
        ConversationKind::Channel
    }
}

/// Map a `users.info` user to a user record
pub fn user_info(user: &SlackUser) -> UserInfo {
    UserInfo {
        id: user.id.to_string(),
        name: user.name.clone().unwrap_or_else(|| user.id.to_string()),
    }
}

/// Map a Socket Mode message push event. Messages without a channel cannot
/// be answered and are skipped.
pub fn message_event(msg: &SlackMessageEvent) -> Option<MessageEvent> {
    let channel = msg.origin.channel.as_ref()?.to_string();
    Some(MessageEvent {
        client_msg_id: msg.origin.client_msg_id.as_ref().map(|id| id.to_string()),
        thread_ts: msg.origin.thread_ts.as_ref().map(|ts| ts.to_string()),
        user: msg
            .sender
            .user
            .as_ref()
            .map(|u| u.to_string())
            .unwrap_or_default(),
        channel,
        text: msg
            .content
            .as_ref()
            .and_then(|c| c.text.clone())
            .unwrap_or_default(),
        ts: msg.origin.ts.to_string(),
    })
}

/// Slack reports rejected tokens as `invalid_auth` / `not_authed`
pub fn is_auth_error(error: &str) -> bool {
    error.contains("invalid_auth") || error.contains("not_authed") || error.contains("account_inactive")
}
