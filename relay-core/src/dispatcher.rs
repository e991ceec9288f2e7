// ABOUTME: Dispatch loop: classifies transport events and fans messages out to processors.
// ABOUTME: Owns the bot's own user ID, written when the transport confirms the connection.

use crate::event::{ChatEvent, MessageEvent};
use crate::message::{ChatContext, Message};
use crate::processor::ProcessorRegistry;
use crate::traits::{ChatApi, EventStream};
use anyhow::{bail, Result};
use std::sync::{Arc, RwLock};
use tokio::task::JoinSet;
use tokio_stream::StreamExt;

/// What the loop should do after an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Fatal transport condition; the loop ends with an error
    Stop(String),
}

/// The chat side of the relay: transport API, processors and the bot identity
pub struct Chat {
    api: Arc<dyn ChatApi>,
    registry: Arc<ProcessorRegistry>,
    bot_id: RwLock<String>,
    reply_in_thread: bool,
}

impl std::fmt::Debug for Chat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chat")
            .field("bot_id", &self.bot_id())
            .field("reply_in_thread", &self.reply_in_thread)
            .field("processors", &self.registry.names())
            .finish()
    }
}

impl Chat {
    pub fn new(
        api: Arc<dyn ChatApi>,
        registry: ProcessorRegistry,
        reply_in_thread: bool,
    ) -> Self {
        Self {
            api,
            registry: Arc::new(registry),
            bot_id: RwLock::new(String::new()),
            reply_in_thread,
        }
    }

    /// The bot's own user ID, empty until connected
    pub fn bot_id(&self) -> String {
        self.bot_id
            .read()
            .map(|id| id.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    fn set_bot_id(&self, id: &str) {
        let mut guard = self.bot_id.write().unwrap_or_else(|e| e.into_inner());
        if !guard.is_empty() && *guard != id {
            tracing::warn!(old = %*guard, new = %id, "Bot identity changed on reconnect");
        }
        *guard = id.to_string();
    }

    pub fn registry(&self) -> &ProcessorRegistry {
        &self.registry
    }

    /// Snapshot of the current identity and reply settings
    pub fn context(&self) -> ChatContext {
        ChatContext {
            api: self.api.clone(),
            bot_id: self.bot_id(),
            reply_in_thread: self.reply_in_thread,
        }
    }

    /// Consume `events` until the stream ends or a fatal event arrives.
    ///
    /// Each message is normalized and dispatched on its own task so the loop
    /// keeps draining the stream. In-flight dispatches are awaited before
    /// returning.
    pub async fn run(self: Arc<Self>, mut events: EventStream) -> Result<()> {
        let mut in_flight = JoinSet::new();
        let mut outcome = Ok(());

        while let Some(event) = events.next().await {
            match event {
                ChatEvent::Message(message) => {
                    // Identity is captured at arrival, not when the task runs
                    let ctx = self.context();
                    let chat = self.clone();
                    in_flight.spawn(async move { chat.handle_message(message, ctx).await });
                }
                other => {
                    if let Flow::Stop(reason) = self.handle_lifecycle(other) {
                        outcome = Err(anyhow::anyhow!(reason));
                        break;
                    }
                }
            }
            // Reap finished dispatches without blocking the loop
            while let Some(joined) = in_flight.try_join_next() {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "Dispatch task failed");
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Dispatch task failed");
            }
        }
        tracing::info!("Event stream ended");
        outcome
    }

    /// Normalize one message event against `ctx` and, if complete, dispatch it
    pub async fn handle_message(&self, event: MessageEvent, ctx: ChatContext) {
        let channel = event.channel.clone();
        let msg = match Message::read(event, ctx).await {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(channel = %channel, error = %e, "Failed to read message, dropping");
                return;
            }
        };
        if !msg.is_completed() {
            tracing::debug!(channel = %channel, "Dropping message without client id");
            return;
        }
        tracing::debug!(
            channel = %channel,
            mention = msg.is_mention(),
            thread = msg.is_thread(),
            "Dispatching message"
        );
        self.registry.dispatch(&msg).await;
    }

    /// Handle every non-message event. Only `InvalidAuth` stops the loop.
    pub fn handle_lifecycle(&self, event: ChatEvent) -> Flow {
        match event {
            ChatEvent::Message(_) => {}
            ChatEvent::Connecting {
                attempt,
                connection_count,
            } => {
                tracing::info!(attempt, connection_count, "Connecting to chat");
            }
            ChatEvent::Connected {
                bot_id,
                bot_name,
                team,
                connection_count,
            } => {
                self.set_bot_id(&bot_id);
                tracing::info!(
                    bot_id = %bot_id,
                    bot_name = %bot_name,
                    team = %team,
                    connection_count,
                    "Connected to chat"
                );
            }
            ChatEvent::InvalidAuth => {
                tracing::error!("Chat credentials were rejected");
                return Flow::Stop("Invalid chat credentials".to_string());
            }
            ChatEvent::ConnectionError { reason } => {
                tracing::warn!(reason = %reason, "Chat connection error");
            }
            ChatEvent::Disconnected { reason } => {
                tracing::warn!(reason = %reason, "Disconnected from chat");
            }
            ChatEvent::IncomingError { reason } => {
                tracing::warn!(reason = %reason, "Error receiving chat event");
            }
            ChatEvent::MessageTooLong => {
                tracing::warn!("Outgoing message was too long");
            }
            ChatEvent::OutgoingError { reason } => {
                tracing::warn!(reason = %reason, "Error sending chat message");
            }
            ChatEvent::RateLimited { retry_after } => {
                tracing::warn!(retry_after_ms = retry_after.as_millis() as u64, "Rate limited by chat");
            }
            ChatEvent::UnmarshallingError { reason } => {
                tracing::warn!(reason = %reason, "Could not decode chat event");
            }
            ChatEvent::Other { kind } => {
                tracing::debug!(kind = %kind, "Ignoring chat event");
            }
        }
        Flow::Continue
    }

    /// Fail fast when no processors are wired
    pub fn ensure_ready(&self) -> Result<()> {
        if self.registry.is_empty() {
            bail!("No message processors registered");
        }
        Ok(())
    }
}
