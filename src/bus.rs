use crate::chat::{ChatMessage, Mode};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A message was appended to a conversation
    Message { message: ChatMessage },

    /// Takeover, release, or an implicit takeover by an operator message
    #[serde(rename_all = "camelCase")]
    ModeChanged { conversation_id: String, mode: Mode },

    /// A visitor tab came online or went quiet
    #[serde(rename_all = "camelCase")]
    Presence { conversation_id: String, online: bool },
}

impl Event {
    pub fn conversation_id(&self) -> &str {
        match self {
            Event::Message { message } => &message.conversation_id,
            Event::ModeChanged { conversation_id, .. } => conversation_id,
            Event::Presence { conversation_id, .. } => conversation_id,
        }
    }

    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            Event::Message { .. } => "message",
            Event::ModeChanged { .. } => "mode_changed",
            Event::Presence { .. } => "presence",
        }
    }

    /// Whether a visitor watching their own conversation should see this.
    pub fn is_visitor_visible(&self) -> bool {
        !matches!(self, Event::Presence { .. })
    }
}

pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: Event) {
        // We ignore the error if there are no receivers
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
