//! Progress events and the channel that delivers them.
//!
//! Dispatch is synchronous and in emit order. Each `emit` iterates over a
//! snapshot of the subscriber list, so a listener may subscribe or
//! unsubscribe (itself included) while being called.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Kind of progress event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AgentEventKind {
    /// Free-form orchestrator log line
    Log,
    /// A stage started, finished or changed what it is doing
    AgentAction,
    /// The research plan was resolved
    Plan,
    /// A search query is about to run
    Search,
    /// A new image URL was accepted
    Image,
    /// The validated source list
    Source,
    /// One chunk of the streaming report
    ReportChunk,
    /// The pipeline published its result
    Complete,
    /// A stage failed (absorbed) or the pipeline aborted
    Error,
}

impl AgentEventKind {
    /// `complete` and `error` signal the end of a run to observers.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

/// A single progress notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentEvent {
    #[serde(rename = "type")]
    pub kind: AgentEventKind,
    #[serde(rename = "agentName", default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl AgentEvent {
    pub fn new(kind: AgentEventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            agent_name: None,
            message: message.into(),
            data: None,
            timestamp: Utc::now(),
        }
    }

    pub fn log(message: impl Into<String>) -> Self {
        Self::new(AgentEventKind::Log, message)
    }

    pub fn action(agent: &str, message: impl Into<String>) -> Self {
        Self::new(AgentEventKind::AgentAction, message).with_agent(agent)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(AgentEventKind::Error, message)
    }

    pub fn with_agent(mut self, agent: &str) -> Self {
        self.agent_name = Some(agent.to_string());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

type Listener = Arc<dyn Fn(&AgentEvent) + Send + Sync>;

struct Subscribers {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(u64, Listener)>>,
}

/// Publish/subscribe channel for [`AgentEvent`]s.
///
/// Cloning is cheap and every clone shares one subscriber list.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Subscribers>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Subscribers {
                next_id: AtomicU64::new(0),
                listeners: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Register a listener. Dropping the returned handle keeps the listener
    /// registered; call [`Subscription::unsubscribe`] to remove it.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&AgentEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((id, Arc::new(listener)));

        Subscription {
            id,
            subscribers: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every listener registered at call time.
    pub fn emit(&self, event: AgentEvent) {
        debug!(
            kind = ?event.kind,
            agent = event.agent_name.as_deref().unwrap_or("-"),
            message = %event.message,
            "agent event"
        );

        // Release the lock before calling out so listeners can re-enter.
        let snapshot: Vec<Listener> = self
            .inner
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            listener(&event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// Handle returned by [`EventBus::subscribe`].
pub struct Subscription {
    id: u64,
    subscribers: Weak<Subscribers>,
}

impl Subscription {
    /// Remove the listener. A no-op if the bus is already gone.
    pub fn unsubscribe(self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers
                .listeners
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .retain(|(id, _)| *id != self.id);
        }
    }
}
