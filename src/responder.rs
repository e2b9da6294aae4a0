//! Automated replies: intent routing, context assembly, and the text
//! generation backend behind a trait.

pub mod context;
pub mod intent;
pub mod openai;

pub use context::{assemble, ResponderContext};
pub use intent::{DisplayDirective, Intent};
pub use openai::OpenAiResponder;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Sent (and stored) in place of a generated reply whenever generation fails.
pub const FALLBACK_REPLY: &str =
    "Sorry, I'm having trouble answering right now. Please try again in a moment.";

/// What the backend is asked: instructions plus context, and the visitor's words.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub message: String,
}

impl Prompt {
    pub fn new(owner_name: &str, context: &ResponderContext, message: &str) -> Self {
        let system = format!(
            "You are the assistant on {owner}'s portfolio website. Answer the visitor's \
             questions about {owner} using only the information below. Keep answers short \
             and friendly. If the information does not cover the question, say so and suggest the visitor \
             wait for {owner} to join the chat.\n\n{context}",
            owner = owner_name,
            context = context.text,
        );
        Self {
            system,
            message: message.to_string(),
        }
    }
}

/// Error classification for responder failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderErrorKind {
    /// Connection failure or timeout
    Network,
    /// 429
    RateLimit,
    /// 5xx
    ServerError,
    /// 401, 403
    Auth,
    /// Other 4xx
    InvalidRequest,
    /// A 2xx body we could not use
    InvalidResponse,
    /// No API key configured
    Unconfigured,
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct ResponderError {
    pub kind: ResponderErrorKind,
    pub message: String,
}

impl ResponderError {
    pub fn new(kind: ResponderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ResponderErrorKind::Network, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ResponderErrorKind::InvalidResponse, message)
    }

    pub fn unconfigured() -> Self {
        Self::new(ResponderErrorKind::Unconfigured, "no responder API key configured")
    }

    pub fn from_status(status: u16, body: &str) -> Self {
        let kind = match status {
            401 | 403 => ResponderErrorKind::Auth,
            429 => ResponderErrorKind::RateLimit,
            500..=599 => ResponderErrorKind::ServerError,
            _ => ResponderErrorKind::InvalidRequest,
        };
        Self::new(kind, format!("responder returned {}: {}", status, body))
    }
}

/// A text generation backend.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, prompt: &Prompt) -> Result<String, ResponderError>;

    fn name(&self) -> &str;
}

/// Used when no API key is configured: every turn degrades to the fallback.
pub struct UnconfiguredResponder;

#[async_trait]
impl Responder for UnconfiguredResponder {
    async fn respond(&self, _prompt: &Prompt) -> Result<String, ResponderError> {
        Err(ResponderError::unconfigured())
    }

    fn name(&self) -> &str {
        "unconfigured"
    }
}

/// Logging wrapper for responders
pub struct LoggingResponder {
    inner: Arc<dyn Responder>,
}

impl LoggingResponder {
    pub fn new(inner: Arc<dyn Responder>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Responder for LoggingResponder {
    async fn respond(&self, prompt: &Prompt) -> Result<String, ResponderError> {
        let start = Instant::now();
        let result = self.inner.respond(prompt).await;
        let duration = start.elapsed();

        match &result {
            Ok(text) => {
                tracing::info!(
                    responder = %self.inner.name(),
                    duration_ms = %duration.as_millis(),
                    reply_chars = text.chars().count(),
                    "Responder request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    responder = %self.inner.name(),
                    duration_ms = %duration.as_millis(),
                    kind = ?e.kind,
                    error = %e.message,
                    "Responder request failed"
                );
            }
        }

        result
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
