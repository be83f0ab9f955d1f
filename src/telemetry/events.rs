//! Session Events
//!
//! Broadcast of session lifecycle changes. The surrounding application
//! subscribes to react to a forced logout (redirect to the login screen);
//! this crate only emits the signal.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

pub const DEFAULT_EVENT_CAPACITY: usize = 32;

/// Session lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Login succeeded.
    LoggedIn { subject: String },
    /// Token pair replaced by a refresh.
    Refreshed { subject: String },
    /// Session cleared because it could not be renewed.
    ForcedLogout { reason: String },
    /// Session cleared on request.
    LoggedOut,
}

/// Fan-out of [`SessionEvent`]s to any number of subscribers.
#[derive(Clone)]
pub struct SessionEventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn emit(&self, event: SessionEvent) {
        let receivers = self.sender.send(event.clone()).unwrap_or(0);
        trace!(?event, receivers, "Session event emitted");
    }
}

impl Default for SessionEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
