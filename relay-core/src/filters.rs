// ABOUTME: Composable message predicates and the action type processors run.
// ABOUTME: Filters are ordered predicate lists evaluated outer-to-inner with short-circuit.

use crate::message::Message;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// Something a processor does with a message
#[async_trait]
pub trait MessageAction: Send + Sync {
    async fn call(&self, msg: Message);
}

/// Shared, type-erased action
pub type SharedAction = Arc<dyn MessageAction>;

struct FnAction<F>(F);

#[async_trait]
impl<F, Fut> MessageAction for FnAction<F>
where
    F: Fn(Message) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn call(&self, msg: Message) {
        (self.0)(msg).await
    }
}

/// Wrap an async closure as an action
pub fn action<F, Fut>(f: F) -> SharedAction
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(FnAction(f))
}

// =============================================================================
// Predicates
// =============================================================================

/// A yes/no question about a message
pub trait Predicate: Send + Sync + std::fmt::Debug {
    fn matches(&self, msg: &Message) -> bool;
}

/// The bot was mentioned
#[derive(Debug, Clone, Copy)]
pub struct Mentioned;

impl Predicate for Mentioned {
    fn matches(&self, msg: &Message) -> bool {
        msg.is_mention()
    }
}

/// The bot was not mentioned
#[derive(Debug, Clone, Copy)]
pub struct NotMentioned;

impl Predicate for NotMentioned {
    fn matches(&self, msg: &Message) -> bool {
        !msg.is_mention()
    }
}

/// Text contains a substring (case-sensitive)
#[derive(Debug, Clone)]
pub struct Contains(pub String);

impl Predicate for Contains {
    fn matches(&self, msg: &Message) -> bool {
        msg.text().contains(self.0.as_str())
    }
}

/// Text equals a literal exactly
#[derive(Debug, Clone)]
pub struct Exactly(pub String);

impl Predicate for Exactly {
    fn matches(&self, msg: &Message) -> bool {
        msg.text() == self.0
    }
}

/// Ordered list of predicates; all must hold
#[derive(Debug, Default)]
pub struct Filter {
    predicates: Vec<Box<dyn Predicate>>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, predicate: impl Predicate + 'static) -> Self {
        self.predicates.push(Box::new(predicate));
        self
    }

    pub fn mentioned(self) -> Self {
        self.with(Mentioned)
    }

    pub fn not_mentioned(self) -> Self {
        self.with(NotMentioned)
    }

    pub fn contains(self, needle: impl Into<String>) -> Self {
        self.with(Contains(needle.into()))
    }

    pub fn exactly(self, literal: impl Into<String>) -> Self {
        self.with(Exactly(literal.into()))
    }

    /// Evaluate in order, stopping at the first predicate that fails
    pub fn matches(&self, msg: &Message) -> bool {
        self.predicates.iter().all(|p| p.matches(msg))
    }

    /// Gate `inner` behind this filter
    pub fn then(self, inner: SharedAction) -> SharedAction {
        Arc::new(Gated {
            filter: self,
            inner,
        })
    }
}

/// An action that only runs when its filter matches
struct Gated {
    filter: Filter,
    inner: SharedAction,
}

#[async_trait]
impl MessageAction for Gated {
    async fn call(&self, msg: Message) {
        if self.filter.matches(&msg) {
            self.inner.call(msg).await;
        }
    }
}

// Nesting helpers: `mentioned(contains(p, "build"))` checks the mention
// first and only then the text.

pub fn mentioned(inner: SharedAction) -> SharedAction {
    Filter::new().mentioned().then(inner)
}

pub fn not_mentioned(inner: SharedAction) -> SharedAction {
    Filter::new().not_mentioned().then(inner)
}

pub fn contains(inner: SharedAction, needle: &str) -> SharedAction {
    Filter::new().contains(needle).then(inner)
}

pub fn exactly(inner: SharedAction, literal: &str) -> SharedAction {
    Filter::new().exactly(literal).then(inner)
}
