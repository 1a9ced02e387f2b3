use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::ConsoleError;

/// An opaque "something changed" notification. Payloads carry no guarantees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelEvent {
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Lifecycle of the notification channel connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelConnection {
    Unsubscribed,
    Subscribing,
    Subscribed,
    /// The transport dropped; the next `ensure_connected` reconnects.
    Disconnected,
}

/// A live channel connection. Yields events until the transport drops or the
/// subscription is dropped, which also stops the transport task.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    pump: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(events: mpsc::UnboundedReceiver<ChannelEvent>) -> Self {
        Self { events, pump: None }
    }

    /// Tie a background transport task to this subscription's lifetime.
    pub fn with_pump(events: mpsc::UnboundedReceiver<ChannelEvent>, pump: JoinHandle<()>) -> Self {
        Self {
            events,
            pump: Some(pump),
        }
    }

    /// Next event, or `None` once the connection is gone.
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn connect(&self) -> Result<Subscription, ConsoleError>;
}
