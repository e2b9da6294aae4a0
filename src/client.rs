//! HTTP client for the visitor side of the chat API.
//!
//! Keeps the anonymous token and current conversation, and on a 401 while
//! sending re-establishes the session once and resends the same message.

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::chat::ChatMessage;
use crate::responder::{DisplayDirective, Intent};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub conversation_id: String,
    pub visitor_id: String,
    pub is_human_controlled: bool,
    pub messages: Vec<ChatMessage>,
}

/// Reply to a visitor message, as seen by the client.
#[derive(Debug, Clone, PartialEq)]
pub enum SendResult {
    Reply {
        text: String,
        display: Option<DisplayDirective>,
    },
    SentToOperator,
}

#[derive(Debug, Deserialize)]
struct RawSendResponse {
    reply: Option<String>,
    status: Option<String>,
    display: Option<DisplayDirective>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnonymousResponse {
    token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendBody<'a> {
    conversation_id: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    intent: Option<Intent>,
}

pub struct VisitorClient {
    http: Client,
    base_url: String,
    token: Option<String>,
    name: Option<String>,
    conversation_id: Option<String>,
}

impl VisitorClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            name: None,
            conversation_id: None,
        })
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// Start or resume, creating an anonymous identity first if needed.
    pub async fn start(&mut self, name: Option<&str>) -> Result<StartResponse> {
        if let Some(name) = name {
            self.name = Some(name.to_string());
        }
        self.ensure_identity().await?;

        let response = self.post_start().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            info!("Session rejected on start, re-authenticating");
            self.token = None;
            self.ensure_identity().await?;
            let retry = self.post_start().await?;
            return self.finish_start(retry).await;
        }

        self.finish_start(response).await
    }

    /// Send a message in the current conversation. A 401 triggers exactly
    /// one silent re-establish-and-resend.
    pub async fn send(&mut self, content: &str, intent: Option<Intent>) -> Result<SendResult> {
        if self.conversation_id.is_none() {
            self.start(None).await?;
        }

        let response = self.post_send(content, intent).await?;
        let response = if response.status() == StatusCode::UNAUTHORIZED {
            info!("Session rejected on send, re-establishing and resending once");
            self.token = None;
            self.conversation_id = None;
            self.start(None).await?;
            self.post_send(content, intent).await?
        } else {
            response
        };

        let raw: RawSendResponse = decode(response).await?;
        match (raw.reply, raw.status.as_deref()) {
            (Some(text), _) => Ok(SendResult::Reply {
                text,
                display: raw.display,
            }),
            (None, Some("sent_to_operator")) => Ok(SendResult::SentToOperator),
            (None, other) => anyhow::bail!("Unexpected send response status: {:?}", other),
        }
    }

    async fn ensure_identity(&mut self) -> Result<()> {
        if self.token.is_some() {
            return Ok(());
        }
        let response = self
            .http
            .post(format!("{}/auth/anonymous", self.base_url))
            .send()
            .await
            .context("Failed to reach identity endpoint")?;
        let body: AnonymousResponse = decode(response).await?;
        debug!("Established anonymous identity");
        self.token = Some(body.token);
        Ok(())
    }

    async fn post_start(&self) -> Result<Response> {
        self.authorized(self.http.post(format!("{}/chat/start", self.base_url)))
            .json(&json!({ "name": self.name }))
            .send()
            .await
            .context("Failed to start chat")
    }

    async fn finish_start(&mut self, response: Response) -> Result<StartResponse> {
        let started: StartResponse = decode(response).await?;
        self.conversation_id = Some(started.conversation_id.clone());
        Ok(started)
    }

    async fn post_send(&self, content: &str, intent: Option<Intent>) -> Result<Response> {
        let conversation_id = self
            .conversation_id
            .as_deref()
            .context("No active conversation")?;

        self.authorized(self.http.post(format!("{}/chat/send", self.base_url)))
            .json(&SendBody {
                conversation_id,
                content,
                intent,
            })
            .send()
            .await
            .context("Failed to send message")
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Request failed with {}: {}", status, body);
    }
    response.json().await.context("Malformed response body")
}
