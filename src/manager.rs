//! Conversation lifecycle, bot/operator handoff, and visitor message routing.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::bus::{Event, EventBus};
use crate::chat::{ChatMessage, Conversation, ConversationSummary, Mode, SenderKind};
use crate::content::ContentLibrary;
use crate::entity::{Identity, Role};
use crate::error::{AppError, AppResult};
use crate::presence::{Beat, PresenceTracker};
use crate::responder::{self, DisplayDirective, Intent, Prompt, Responder, FALLBACK_REPLY};
use crate::store::Store;

pub const MAX_MESSAGE_CHARS: usize = 2000;
pub const MAX_NAME_CHARS: usize = 80;

/// Result of `start_or_resume`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumedSession {
    pub conversation_id: String,
    pub visitor_id: String,
    pub is_human_controlled: bool,
    pub messages: Vec<ChatMessage>,
}

/// What happened to a visitor message.
#[derive(Debug, Clone)]
pub enum SendOutcome {
    /// An automated reply was generated (or the fallback was used) and stored.
    Replied {
        message: ChatMessage,
        display: Option<DisplayDirective>,
    },
    /// The conversation is operator-controlled; nothing was generated.
    SentToOperator,
}

pub struct ChatManager {
    store: Store,
    bus: Arc<EventBus>,
    responder: Arc<dyn Responder>,
    content: ContentLibrary,
    presence: Arc<PresenceTracker>,
    owner_name: String,
    history_limit: i64,
}

impl ChatManager {
    pub fn new(
        store: Store,
        bus: Arc<EventBus>,
        responder: Arc<dyn Responder>,
        presence: Arc<PresenceTracker>,
        owner_name: impl Into<String>,
        history_limit: i64,
    ) -> Self {
        Self {
            content: ContentLibrary::new(store.clone()),
            store,
            bus,
            responder,
            presence,
            owner_name: owner_name.into(),
            history_limit,
        }
    }

    pub fn content(&self) -> &ContentLibrary {
        &self.content
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Return the visitor's current conversation, creating one if none
    /// exists (or if `reset` is set). Repeated calls without `reset` return
    /// the same conversation.
    pub async fn start_or_resume(
        &self,
        visitor: &Identity,
        name: Option<&str>,
        reset: bool,
    ) -> AppResult<ResumedSession> {
        let name = name.map(str::trim).filter(|n| !n.is_empty());
        if let Some(name) = name {
            if name.chars().count() > MAX_NAME_CHARS {
                return Err(AppError::validation(format!(
                    "name must be at most {} characters",
                    MAX_NAME_CHARS
                )));
            }
            if visitor.display_name.as_deref() != Some(name) {
                self.store.set_display_name(&visitor.id, name).await?;
            }
        }

        let conversation = if reset {
            let conv = Conversation::new(&visitor.id);
            self.store.create_conversation(&conv).await?;
            info!(conversation_id = %conv.id, visitor = %visitor, "Started fresh conversation");
            conv
        } else {
            let (conv, created) = self
                .store
                .latest_or_create_conversation(&Conversation::new(&visitor.id))
                .await?;
            if created {
                info!(conversation_id = %conv.id, visitor = %visitor, "Started conversation");
            }
            conv
        };

        let messages = self
            .store
            .recent_messages(&conversation.id, self.history_limit)
            .await?;

        Ok(ResumedSession {
            conversation_id: conversation.id.clone(),
            visitor_id: visitor.id.clone(),
            is_human_controlled: conversation.mode().is_human_controlled(),
            messages,
        })
    }

    /// Load a conversation the caller may watch: their own, or any if they
    /// are the owner.
    pub async fn conversation_for(&self, caller: &Identity, role: Role, conversation_id: &str) -> AppResult<Conversation> {
        let conversation = self.load(conversation_id).await?;
        if conversation.visitor_id != caller.id && role != Role::Owner {
            return Err(AppError::Forbidden);
        }
        Ok(conversation)
    }

    /// Load a conversation the caller may write into as its visitor. The
    /// owner speaks through `send_operator_message` instead.
    async fn own_conversation(&self, caller: &Identity, conversation_id: &str) -> AppResult<Conversation> {
        let conversation = self.load(conversation_id).await?;
        if conversation.visitor_id != caller.id {
            return Err(AppError::Forbidden);
        }
        Ok(conversation)
    }

    // ---------------------------------------------------------------------
    // Visitor messages
    // ---------------------------------------------------------------------

    /// Persist the visitor's message, then either leave it for the operator
    /// or generate an automated reply.
    ///
    /// The mode is read once after persisting. A takeover landing while the
    /// responder is running does not stop the reply from being appended.
    pub async fn send_visitor_message(
        &self,
        caller: &Identity,
        conversation_id: &str,
        content: &str,
        intent: Option<Intent>,
    ) -> AppResult<SendOutcome> {
        let content = validate_content(content)?;
        self.own_conversation(caller, conversation_id).await?;

        let incoming = ChatMessage::new(conversation_id, SenderKind::Visitor, content);
        self.store.append_message(&incoming).await?;
        self.bus.publish(Event::Message { message: incoming });

        let mode = self.load(conversation_id).await?.mode();
        if mode.is_human_controlled() {
            info!(conversation_id = %conversation_id, "Visitor message routed to operator");
            return Ok(SendOutcome::SentToOperator);
        }

        let context = responder::assemble(&self.content, intent).await;
        let prompt = Prompt::new(&self.owner_name, &context, content);

        let (text, display) = match self.responder.respond(&prompt).await {
            Ok(text) if !text.trim().is_empty() => (text, context.display),
            Ok(_) => {
                warn!(conversation_id = %conversation_id, "Responder returned empty text, using fallback");
                (FALLBACK_REPLY.to_string(), None)
            }
            Err(e) => {
                warn!(conversation_id = %conversation_id, "Responder failed, using fallback: {}", e);
                (FALLBACK_REPLY.to_string(), None)
            }
        };

        let reply = ChatMessage::new(conversation_id, SenderKind::Automated, text);
        self.store.append_message(&reply).await?;
        self.bus.publish(Event::Message { message: reply.clone() });

        Ok(SendOutcome::Replied {
            message: reply,
            display,
        })
    }

    // ---------------------------------------------------------------------
    // Operator actions
    // ---------------------------------------------------------------------

    /// AUTOMATED -> HUMAN_CONTROLLED. The caller must already be verified
    /// as the owner.
    pub async fn takeover(&self, operator: &Identity, conversation_id: &str) -> AppResult<Mode> {
        if !self.store.set_operator(conversation_id, Some(&operator.id)).await? {
            return Err(AppError::NotFound("conversation".to_string()));
        }
        info!(conversation_id = %conversation_id, operator = %operator, "Operator took over");
        self.publish_mode(conversation_id, Mode::HumanControlled);
        Ok(Mode::HumanControlled)
    }

    /// HUMAN_CONTROLLED -> AUTOMATED.
    pub async fn release(&self, operator: &Identity, conversation_id: &str) -> AppResult<Mode> {
        if !self.store.set_operator(conversation_id, None).await? {
            return Err(AppError::NotFound("conversation".to_string()));
        }
        info!(conversation_id = %conversation_id, operator = %operator, "Operator released conversation");
        self.publish_mode(conversation_id, Mode::Automated);
        Ok(Mode::Automated)
    }

    /// Operator message. Takes the conversation over first if it is still
    /// automated; the flip and the insert commit together.
    pub async fn send_operator_message(
        &self,
        operator: &Identity,
        conversation_id: &str,
        content: &str,
    ) -> AppResult<ChatMessage> {
        let content = validate_content(content)?;
        self.load(conversation_id).await?;

        let message = ChatMessage::new(conversation_id, SenderKind::Operator, content);
        let flipped = self.store.append_operator_message(&message, &operator.id).await?;

        if flipped {
            info!(conversation_id = %conversation_id, "Operator message implied takeover");
            self.publish_mode(conversation_id, Mode::HumanControlled);
        }
        self.bus.publish(Event::Message {
            message: message.clone(),
        });

        Ok(message)
    }

    pub async fn list_conversations(&self) -> AppResult<Vec<ConversationSummary>> {
        let now = Instant::now();
        let mut summaries = self.store.list_conversation_summaries().await?;
        for summary in &mut summaries {
            summary.online = self.presence.is_online(&summary.id, now);
        }
        Ok(summaries)
    }

    pub async fn conversation_messages(&self, conversation_id: &str) -> AppResult<Vec<ChatMessage>> {
        self.load(conversation_id).await?;
        Ok(self.store.all_messages(conversation_id).await?)
    }

    // ---------------------------------------------------------------------
    // Presence
    // ---------------------------------------------------------------------

    pub async fn heartbeat(&self, caller: &Identity, conversation_id: &str) -> AppResult<()> {
        self.own_conversation(caller, conversation_id).await?;
        self.store.touch_last_seen(conversation_id, Utc::now()).await?;

        match self.presence.beat(conversation_id, Instant::now()) {
            Beat::Steady => {}
            Beat::CameOnline => self.publish_presence(conversation_id, true),
            Beat::Resumed => {
                self.publish_presence(conversation_id, false);
                self.publish_presence(conversation_id, true);
            }
        }
        Ok(())
    }

    async fn load(&self, conversation_id: &str) -> AppResult<Conversation> {
        self.store
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| AppError::NotFound("conversation".to_string()))
    }

    fn publish_presence(&self, conversation_id: &str, online: bool) {
        self.bus.publish(Event::Presence {
            conversation_id: conversation_id.to_string(),
            online,
        });
    }

    fn publish_mode(&self, conversation_id: &str, mode: Mode) {
        self.bus.publish(Event::ModeChanged {
            conversation_id: conversation_id.to_string(),
            mode,
        });
    }
}

fn validate_content(content: &str) -> AppResult<&str> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::validation("content is required"));
    }
    if content.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::validation(format!(
            "content must be at most {} characters",
            MAX_MESSAGE_CHARS
        )));
    }
    Ok(content)
}
