// ABOUTME: Slack transport for relay: Socket Mode event stream plus Web API calls.
// ABOUTME: Implements ChatApi (users/conversations lookups, replies, reactions) and ChatPlatform.

pub mod convert;

use anyhow::{Context, Result};
use async_trait::async_trait;
use relay_core::config::SlackConfig;
use relay_core::{ChatApi, ChatEvent, ChatPlatform, ConversationInfo, EventStream, UserInfo};
use slack_morphism::prelude::*;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Buffered inbound events between the listener and the dispatch loop
const EVENT_BUFFER: usize = 256;

// =============================================================================
// Shared state passed to Socket Mode callbacks via SlackClientEventsUserState
// =============================================================================

/// Callbacks are fn pointers, so the event sender travels through the
/// listener's user state.
#[derive(Clone)]
struct SlackRelayState {
    tx: mpsc::Sender<ChatEvent>,
}

async fn forward(tx: &mpsc::Sender<ChatEvent>, event: ChatEvent) {
    if tx.send(event).await.is_err() {
        tracing::warn!(platform = "slack", "Event stream receiver dropped");
    }
}

// =============================================================================
// Socket Mode callback functions (must be fn pointers, not closures)
// =============================================================================

async fn handle_push_event(
    event: SlackPushEventCallback,
    _client: Arc<SlackHyperClient>,
    states: SlackClientEventsUserState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let state = {
        let guard = states.read().await;
        guard
            .get_user_state::<SlackRelayState>()
            .cloned()
            .ok_or("SlackRelayState not found in user state")?
    };

    let relay_event = match event.event {
        SlackEventCallbackBody::Message(msg_event) => match convert::message_event(&msg_event) {
            Some(message) => ChatEvent::Message(message),
            None => ChatEvent::Other {
                kind: "message_without_channel".to_string(),
            },
        },
        _ => ChatEvent::Other {
            kind: "push_event".to_string(),
        },
    };
    forward(&state.tx, relay_event).await;
    Ok(())
}

fn socket_mode_error_handler(
    err: Box<dyn std::error::Error + Send + Sync>,
    _client: Arc<SlackHyperClient>,
    _states: SlackClientEventsUserState,
) -> HttpStatusCode {
    tracing::error!(platform = "slack", error = %err, "Socket Mode error");
    HttpStatusCode::OK
}

/// Events emitted before the Socket Mode listener starts
fn startup_events(bot_id: String, bot_name: String, team: String) -> [ChatEvent; 2] {
    [
        ChatEvent::Connecting {
            attempt: 1,
            connection_count: 0,
        },
        ChatEvent::Connected {
            bot_id,
            bot_name,
            team,
            connection_count: 1,
        },
    ]
}

// =============================================================================
// SlackPlatform
// =============================================================================

/// Slack transport using slack-morphism with Socket Mode
pub struct SlackPlatform {
    client: Arc<SlackHyperClient>,
    /// Bot OAuth token (xoxb-...) for Web API calls
    bot_token: SlackApiToken,
    /// App-level token (xapp-...) for Socket Mode connections
    app_token: SlackApiToken,
    /// Bot's Slack user ID, resolved via auth.test
    bot_user_id: String,
    team: String,
}

impl std::fmt::Debug for SlackPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackPlatform")
            .field("bot_user_id", &self.bot_user_id)
            .field("team", &self.team)
            .finish_non_exhaustive()
    }
}

impl SlackPlatform {
    /// Create the client and resolve the bot's identity via `auth.test`
    pub async fn new(config: &SlackConfig) -> Result<Self> {
        let client = Arc::new(SlackClient::new(
            SlackClientHyperConnector::new().context("Failed to create Slack HTTP connector")?,
        ));

        let bot_token = SlackApiToken::new(SlackApiTokenValue(config.bot_token.clone()));
        let app_token = SlackApiToken::new(SlackApiTokenValue(config.app_token.clone()));

        let session = client.open_session(&bot_token);
        let auth_response = session
            .auth_test()
            .await
            .context("Failed to call Slack auth.test, check slack.bot_token")?;

        let bot_user_id = auth_response.user_id.to_string();
        let team = auth_response.team.to_string();
        tracing::info!(bot_user = %bot_user_id, team = %team, "Slack bot authenticated");

        Ok(Self {
            client,
            bot_token,
            app_token,
            bot_user_id,
            team,
        })
    }

    pub fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }
}

#[async_trait]
impl ChatApi for SlackPlatform {
    async fn user_info(&self, user_id: &str) -> Result<UserInfo> {
        let session = self.client.open_session(&self.bot_token);
        let resp = session
            .users_info(&SlackApiUsersInfoRequest::new(user_id.into()))
            .await
            .with_context(|| format!("Failed to look up Slack user {}", user_id))?;
        Ok(convert::user_info(&resp.user))
    }

    async fn conversation_info(&self, channel_id: &str) -> Result<ConversationInfo> {
        let session = self.client.open_session(&self.bot_token);
        let resp = session
            .conversations_info(&SlackApiConversationsInfoRequest::new(channel_id.into()))
            .await
            .with_context(|| format!("Failed to look up Slack conversation {}", channel_id))?;
        Ok(convert::conversation_info(&resp.channel))
    }

    async fn send_reply(
        &self,
        channel_id: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<()> {
        let session = self.client.open_session(&self.bot_token);
        let mut req = SlackApiChatPostMessageRequest::new(
            channel_id.into(),
            SlackMessageContent::new().with_text(text.to_string()),
        );
        if let Some(ts) = thread_ts {
            req = req.with_thread_ts(ts.into());
        }
        session
            .chat_post_message(&req)
            .await
            .context("Failed to send Slack message")?;
        Ok(())
    }

    async fn add_reaction(&self, name: &str, channel_id: &str, ts: &str) -> Result<()> {
        let session = self.client.open_session(&self.bot_token);
        let req = SlackApiReactionsAddRequest::new(
            channel_id.into(),
            SlackReactionName(name.to_string()),
            ts.into(),
        );
        session
            .reactions_add(&req)
            .await
            .with_context(|| format!("Failed to add :{}: reaction", name))?;
        Ok(())
    }

    async fn remove_reaction(&self, name: &str, channel_id: &str, ts: &str) -> Result<()> {
        let session = self.client.open_session(&self.bot_token);
        let req = SlackApiReactionsRemoveRequest::new(SlackReactionName(name.to_string()))
            .with_channel(channel_id.into())
            .with_timestamp(ts.into());
        session
            .reactions_remove(&req)
            .await
            .with_context(|| format!("Failed to remove :{}: reaction", name))?;
        Ok(())
    }
}

#[async_trait]
impl ChatPlatform for SlackPlatform {
    async fn event_stream(&self) -> Result<EventStream> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let client = Arc::clone(&self.client);
        let app_token = self.app_token.clone();
        let bot_id = self.bot_user_id.clone();
        let team = self.team.clone();
        let bot_name = match self.user_info(&bot_id).await {
            Ok(user) => user.name,
            Err(e) => {
                tracing::debug!(error = %e, "Could not resolve bot name");
                bot_id.clone()
            }
        };

        tokio::spawn(async move {
            let callbacks =
                SlackSocketModeListenerCallbacks::new().with_push_events(handle_push_event);

            let environment = Arc::new(
                SlackClientEventsListenerEnvironment::new(client.clone())
                    .with_error_handler(socket_mode_error_handler)
                    .with_user_state(SlackRelayState { tx: tx.clone() }),
            );

            let listener = SlackClientSocketModeListener::new(
                &SlackClientSocketModeConfig::new(),
                environment,
                callbacks,
            );

            // auth.test already resolved the identity; announce it before
            // pushes can start arriving
            for event in startup_events(bot_id, bot_name, team) {
                forward(&tx, event).await;
            }

            match listener.listen_for(&app_token).await {
                Ok(_) => {
                    // serve() blocks until the process receives a termination signal
                    listener.serve().await;
                    forward(
                        &tx,
                        ChatEvent::Disconnected {
                            reason: "listener stopped".to_string(),
                        },
                    )
                    .await;
                }
                Err(e) => {
                    let reason = e.to_string();
                    tracing::error!(platform = "slack", error = %reason, "Failed to start Socket Mode listener");
                    let event = if convert::is_auth_error(&reason) {
                        ChatEvent::InvalidAuth
                    } else {
                        ChatEvent::ConnectionError { reason }
                    };
                    forward(&tx, event).await;
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    fn platform_id(&self) -> &'static str {
        "slack"
    }

    async fn shutdown(&self) -> Result<()> {
        tracing::info!(platform = "slack", "Shutting down Slack platform");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slack_platform_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SlackPlatform>();
    }

    #[test]
    fn test_identity_is_announced_before_listening() {
        let events = startup_events("U0BOT".into(), "relay".into(), "acme".into());
        assert!(matches!(events[0], ChatEvent::Connecting { attempt: 1, .. }));
        assert_eq!(
            events[1],
            ChatEvent::Connected {
                bot_id: "U0BOT".to_string(),
                bot_name: "relay".to_string(),
                team: "acme".to_string(),
                connection_count: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_forward_survives_dropped_receiver() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        forward(&tx, ChatEvent::MessageTooLong).await;
    }

    #[tokio::test]
    async fn test_relay_state_clone_shares_sender() {
        let (tx, mut rx) = mpsc::channel(1);
        let state = SlackRelayState { tx };
        let cloned = state.clone();
        forward(&cloned.tx, ChatEvent::InvalidAuth).await;
        assert_eq!(rx.recv().await, Some(ChatEvent::InvalidAuth));
    }
}
