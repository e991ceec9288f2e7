// ABOUTME: Chat side of the relay: event model, normalized messages and processor dispatch.
// ABOUTME: Provides the job-control processors that drive relay-jobs from chat commands.

pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod event;
pub mod filters;
pub mod job_control;
pub mod message;
pub mod processor;
pub mod testing;
pub mod traits;

pub use commands::{parse_args, tokenize, CommandError, ParsedCommand};
pub use config::{Config, DispatchMode};
pub use dispatcher::{Chat, Flow};
pub use event::{ChatEvent, MessageEvent};
pub use filters::{action, Filter, MessageAction, Predicate, SharedAction};
pub use job_control::JobControl;
pub use message::{ChatContext, Message};
pub use processor::{Processor, ProcessorName, ProcessorRegistry, RegistryError};
pub use traits::{
    ChatApi, ChatPlatform, ChatUser, Conversation, ConversationInfo, ConversationKind,
    EventStream, UserInfo,
};

// Re-export relay-jobs so the binary needs one import path
pub use relay_jobs;
